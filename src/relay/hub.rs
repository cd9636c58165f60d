//! In-process relay hub
//!
//! A single tokio task owns every room. Connections talk to it through an
//! unbounded command channel and receive JSON text frames on their own
//! unbounded channel. Frames are forwarded verbatim; the hub only decodes
//! them to pick recipients.

use hashbrown::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::net::protocol::{self, RelayMessage};
use crate::relay::player::ConnectionId;
use crate::relay::room::Room;

enum HubCommand {
    Connect {
        room: String,
        outbound: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Frame {
        conn: ConnectionId,
        text: String,
    },
    Disconnect {
        conn: ConnectionId,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelayError {
    #[error("relay hub is not running")]
    Closed,
}

struct Peer {
    room: String,
    outbound: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct Hub {
    rooms: HashMap<String, Room>,
    peers: HashMap<ConnectionId, Peer>,
    next_conn: ConnectionId,
}

impl Hub {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        info!("Relay hub started");
        while let Some(command) = commands.recv().await {
            match command {
                HubCommand::Connect {
                    room,
                    outbound,
                    reply,
                } => {
                    let conn = self.connect(room, outbound);
                    if reply.send(conn).is_err() {
                        self.disconnect(conn);
                    }
                }
                HubCommand::Frame { conn, text } => self.frame(conn, text),
                HubCommand::Disconnect { conn } => self.disconnect(conn),
                HubCommand::Shutdown => break,
            }
        }
        info!("Relay hub stopped ({} room(s) open)", self.rooms.len());
    }

    fn connect(&mut self, room: String, outbound: mpsc::UnboundedSender<String>) -> ConnectionId {
        self.next_conn += 1;
        let conn = self.next_conn;
        self.rooms
            .entry(room.clone())
            .or_insert_with(|| Room::new(room.clone()))
            .attach(conn);
        debug!("Connection {} opened in room {}", conn, room);
        self.peers.insert(conn, Peer { room, outbound });
        conn
    }

    fn frame(&mut self, conn: ConnectionId, text: String) {
        let Some(peer) = self.peers.get(&conn) else {
            warn!("Frame from unknown connection {}", conn);
            return;
        };
        let Some(room) = self.rooms.get_mut(&peer.room) else {
            return;
        };

        let message = match protocol::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame from connection {}: {}", conn, e);
                return;
            }
        };

        if let RelayMessage::PlayerJoin { id, name, avatar } = &message {
            let joined = room.join(conn, id, name, avatar).map(|_| ());
            match joined {
                Ok(()) => {
                    let code = peer.room.clone();
                    self.broadcast_room_info(&code);
                }
                Err(e) => warn!("Join from connection {} rejected: {}", conn, e),
            }
            return;
        }

        let targets = room.route(conn, &message);
        for target in targets {
            self.send_to(target, text.clone());
        }
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        let Some(peer) = self.peers.remove(&conn) else {
            return;
        };
        debug!("Connection {} closed", conn);
        let Some(room) = self.rooms.get_mut(&peer.room) else {
            return;
        };
        let changed = room.disconnect(conn);
        if room.is_empty() {
            info!("Room {} closed", peer.room);
            self.rooms.remove(&peer.room);
        } else if changed {
            self.broadcast_room_info(&peer.room);
        }
    }

    fn broadcast_room_info(&self, code: &str) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let text = match protocol::encode(&room.room_info()) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode room info for {}: {}", code, e);
                return;
            }
        };
        for &conn in room.connections() {
            self.send_to(conn, text.clone());
        }
    }

    fn send_to(&self, conn: ConnectionId, text: String) {
        if let Some(peer) = self.peers.get(&conn) {
            if peer.outbound.send(text).is_err() {
                debug!("Connection {} receiver dropped", conn);
            }
        }
    }
}

/// Clonable handle to a running hub
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl RelayHandle {
    /// Start the hub task on the current runtime
    pub fn spawn() -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Hub::default().run(receiver));
        Self { commands }
    }

    /// Open a connection in room `room`
    pub async fn connect(&self, room: &str) -> Result<RelayLink, RelayError> {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let (reply, conn) = oneshot::channel();
        self.commands
            .send(HubCommand::Connect {
                room: room.to_string(),
                outbound,
                reply,
            })
            .map_err(|_| RelayError::Closed)?;
        let conn = conn.await.map_err(|_| RelayError::Closed)?;
        Ok(RelayLink {
            conn,
            commands: self.commands.clone(),
            inbound,
        })
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(HubCommand::Shutdown);
    }
}

/// One client connection; dropping it disconnects
pub struct RelayLink {
    conn: ConnectionId,
    commands: mpsc::UnboundedSender<HubCommand>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl RelayLink {
    pub fn id(&self) -> ConnectionId {
        self.conn
    }

    /// Queue a text frame for the hub; fire-and-forget
    pub fn send(&self, text: String) -> Result<(), RelayError> {
        self.commands
            .send(HubCommand::Frame {
                conn: self.conn,
                text,
            })
            .map_err(|_| RelayError::Closed)
    }

    /// Next frame addressed to this connection
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }
}

impl Drop for RelayLink {
    fn drop(&mut self) {
        let _ = self.commands.send(HubCommand::Disconnect { conn: self.conn });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{encode, PlayerInput};
    use crate::util::vec2::Vec2;

    fn join(id: &str, name: &str) -> String {
        encode(&RelayMessage::PlayerJoin {
            id: id.into(),
            name: name.into(),
            avatar: format!("{}.png", name),
        })
        .unwrap()
    }

    async fn next_message(link: &mut RelayLink) -> RelayMessage {
        let text = link.recv().await.expect("link open");
        protocol::decode(&text).unwrap()
    }

    #[tokio::test]
    async fn test_join_broadcasts_room_info() {
        let hub = RelayHandle::spawn();
        let mut a = hub.connect("ROOM").await.unwrap();
        let mut b = hub.connect("ROOM").await.unwrap();

        a.send(join("a", "Ada")).unwrap();
        for link in [&mut a, &mut b] {
            match next_message(link).await {
                RelayMessage::RoomInfo { host_id, players, .. } => {
                    assert_eq!(host_id.as_deref(), Some("a"));
                    assert_eq!(players.len(), 1);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_input_routed_to_host() {
        let hub = RelayHandle::spawn();
        let mut host = hub.connect("ROOM").await.unwrap();
        let mut guest = hub.connect("ROOM").await.unwrap();
        host.send(join("h", "Host")).unwrap();
        guest.send(join("g", "Guest")).unwrap();

        let input = encode(&RelayMessage::PlayerInput {
            id: "g".into(),
            input: PlayerInput::default(),
        })
        .unwrap();
        guest.send(input.clone()).unwrap();
        guest.send("{broken".to_string()).unwrap();
        guest
            .send(encode(&RelayMessage::StartGame { arena: Vec2::new(800.0, 600.0) }).unwrap())
            .unwrap();

        // Host: two roster updates, the input, then start-game
        assert!(matches!(next_message(&mut host).await, RelayMessage::RoomInfo { .. }));
        assert!(matches!(next_message(&mut host).await, RelayMessage::RoomInfo { .. }));
        assert_eq!(host.recv().await.as_deref(), Some(input.as_str()));
        assert!(matches!(next_message(&mut host).await, RelayMessage::StartGame { .. }));

        // Guest: its own roster update and start-game, never its input
        assert!(matches!(next_message(&mut guest).await, RelayMessage::RoomInfo { .. }));
        assert!(matches!(next_message(&mut guest).await, RelayMessage::RoomInfo { .. }));
        assert!(matches!(next_message(&mut guest).await, RelayMessage::StartGame { .. }));
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_drop_in_lobby_updates_roster() {
        let hub = RelayHandle::spawn();
        let mut a = hub.connect("ROOM").await.unwrap();
        let b = hub.connect("ROOM").await.unwrap();
        a.send(join("a", "Ada")).unwrap();
        b.send(join("b", "Bob")).unwrap();
        assert!(matches!(next_message(&mut a).await, RelayMessage::RoomInfo { .. }));
        assert!(matches!(next_message(&mut a).await, RelayMessage::RoomInfo { .. }));

        drop(b);
        match next_message(&mut a).await {
            RelayMessage::RoomInfo { players, .. } => assert_eq!(players.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_connect_after_shutdown_fails() {
        let hub = RelayHandle::spawn();
        hub.shutdown();
        // Shutdown is queued ahead of the connect, so the reply is never sent
        let result = hub.connect("ROOM").await.map(|_| ());
        assert_eq!(result, Err(RelayError::Closed));
    }
}
