//! One relay room: roster, host assignment and routing
//!
//! A room holds no simulation state. It knows which connections are
//! present, which player each belongs to, who the host is, and whether the
//! game has started. Once started, a dropped player keeps their slot so a
//! reconnect with the same name and avatar picks it back up.

use tracing::{debug, info};

use crate::net::protocol::RelayMessage;
use crate::relay::player::{ConnectionId, RelayPlayer};

/// Co-op rooms seat two players
pub const MAX_PLAYERS: usize = 2;

pub struct Room {
    pub code: String,
    connections: Vec<ConnectionId>,
    players: Vec<RelayPlayer>,
    host_id: Option<String>,
    started: bool,
}

impl Room {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            connections: Vec::new(),
            players: Vec::new(),
            host_id: None,
            started: false,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// No live connections remain
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn players(&self) -> &[RelayPlayer] {
        &self.players
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// Register a connection before it announces a player
    pub fn attach(&mut self, conn: ConnectionId) {
        if !self.connections.contains(&conn) {
            self.connections.push(conn);
        }
    }

    /// Bind `conn` to a player
    ///
    /// A disconnected player with the same name and avatar is reclaimed with
    /// their original id, so a returning host stays host. Otherwise the first
    /// player to join becomes host.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        id: &str,
        name: &str,
        avatar: &str,
    ) -> Result<&RelayPlayer, RoomError> {
        self.attach(conn);

        if let Some(index) = self.players.iter().position(|p| p.connection == Some(conn)) {
            return Ok(&self.players[index]);
        }

        if let Some(index) = self
            .players
            .iter()
            .position(|p| !p.is_connected() && p.same_identity(name, avatar))
        {
            let player = &mut self.players[index];
            player.reconnect(conn);
            info!("{} rejoined room {} as {}", name, self.code, player.id);
            return Ok(&self.players[index]);
        }

        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }

        self.players.push(RelayPlayer::new(
            id.to_string(),
            name.to_string(),
            avatar.to_string(),
            conn,
        ));
        if self.host_id.is_none() {
            self.host_id = Some(id.to_string());
        }
        info!(
            "{} joined room {} ({}/{})",
            name,
            self.code,
            self.players.len(),
            MAX_PLAYERS
        );
        Ok(&self.players[self.players.len() - 1])
    }

    /// Drop a connection; returns true if the roster changed
    pub fn disconnect(&mut self, conn: ConnectionId) -> bool {
        self.connections.retain(|&c| c != conn);

        let Some(index) = self.players.iter().position(|p| p.connection == Some(conn)) else {
            return false;
        };

        if self.started {
            self.players[index].disconnect();
            debug!("Keeping slot for {} in started room {}", self.players[index].id, self.code);
            return true;
        }

        let removed = self.players.remove(index);
        if self.host_id.as_deref() == Some(removed.id.as_str()) {
            self.host_id = self.players.first().map(|p| p.id.clone());
            debug!("Room {} host is now {:?}", self.code, self.host_id);
        }
        true
    }

    fn host_connection(&self) -> Option<ConnectionId> {
        let host = self.host_id.as_deref()?;
        self.players
            .iter()
            .find(|p| p.id == host)
            .and_then(|p| p.connection)
    }

    /// Connections that should receive `message` sent by `sender`
    pub fn route(&mut self, sender: ConnectionId, message: &RelayMessage) -> Vec<ConnectionId> {
        match message {
            RelayMessage::PlayerInput { .. } => self
                .host_connection()
                .filter(|&host| host != sender)
                .into_iter()
                .collect(),
            RelayMessage::StartGame { .. } => {
                if !self.started {
                    info!("Room {} started", self.code);
                }
                self.started = true;
                self.connections.clone()
            }
            // Membership is managed by the room itself
            RelayMessage::PlayerJoin { .. } | RelayMessage::RoomInfo { .. } => Vec::new(),
            _ => self
                .connections
                .iter()
                .copied()
                .filter(|&c| c != sender)
                .collect(),
        }
    }

    /// Full roster broadcast
    pub fn room_info(&self) -> RelayMessage {
        let host = self.host_id.as_deref();
        RelayMessage::RoomInfo {
            room: self.code.clone(),
            host_id: self.host_id.clone(),
            players: self.players.iter().map(|p| p.roster_entry(host)).collect(),
        }
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
}
