use crate::net::protocol::RosterEntry;

/// Hub-assigned connection handle
pub type ConnectionId = u64;

/// Player connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerConnectionState {
    /// Bound to a live connection
    Connected,
    /// Connection dropped after the game started; the slot is kept
    Disconnected,
}

/// Roster entry held by a relay room
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPlayer {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub connection: Option<ConnectionId>,
    pub connection_state: PlayerConnectionState,
}

impl RelayPlayer {
    pub fn new(id: String, name: String, avatar: String, connection: ConnectionId) -> Self {
        Self {
            id,
            name,
            avatar,
            connection: Some(connection),
            connection_state: PlayerConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == PlayerConnectionState::Connected
    }

    pub fn disconnect(&mut self) {
        self.connection = None;
        self.connection_state = PlayerConnectionState::Disconnected;
    }

    pub fn reconnect(&mut self, connection: ConnectionId) {
        self.connection = Some(connection);
        self.connection_state = PlayerConnectionState::Connected;
    }

    /// Same person coming back: name and avatar both match
    pub fn same_identity(&self, name: &str, avatar: &str) -> bool {
        self.name == name && self.avatar == avatar
    }

    pub fn roster_entry(&self, host_id: Option<&str>) -> RosterEntry {
        RosterEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            host: host_id == Some(self.id.as_str()),
            connected: self.is_connected(),
        }
    }
}
