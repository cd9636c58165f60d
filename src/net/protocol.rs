use serde::{Deserialize, Serialize};

use crate::game::constants::net;
use crate::game::match_result::MatchSummary;
use crate::game::state::PlayerSlot;
use crate::game::systems::upgrade::Upgrade;
use crate::net::codec::WireSnapshot;
use crate::util::vec2::Vec2;

/// Directional key held by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

/// Player input state sampled once per frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Held movement keys
    #[serde(default)]
    pub keys: Vec<Key>,
    /// Analog stick, overrides keys outside the deadzone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Vec2>,
    /// Aim point in arena coordinates
    #[serde(default)]
    pub aim: Option<Vec2>,
    /// Local input sequence number
    #[serde(default)]
    pub seq: u32,
}

impl PlayerInput {
    pub fn with_keys(keys: &[Key]) -> Self {
        Self {
            keys: keys.to_vec(),
            ..Default::default()
        }
    }
}

/// Upgrade choices offered to one player slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferMessage {
    pub slot: PlayerSlot,
    pub options: Vec<Upgrade>,
}

/// Roster row as broadcast in `room-info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub host: bool,
    pub connected: bool,
}

/// Every message exchanged through the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayMessage {
    /// Announce a player to the room (sent by the client on connect)
    PlayerJoin {
        id: String,
        name: String,
        avatar: String,
    },
    /// Guest input, forwarded only to the host
    PlayerInput { id: String, input: PlayerInput },
    /// Host snapshot, forwarded to everyone but the sender
    GameState { snapshot: WireSnapshot },
    /// Match start with the chosen arena size
    StartGame { arena: Vec2 },
    /// A simultaneous upgrade round opened
    LevelUp { offers: Vec<OfferMessage> },
    /// A player picked option `choice` of their current offer
    UpgradeSelected { slot: PlayerSlot, choice: usize },
    /// Every offer of the round has been resolved
    UpgradesComplete,
    /// Authoritative end of match
    GameOver { summary: MatchSummary },
    /// Full roster, sent whenever membership changes
    RoomInfo {
        room: String,
        host_id: Option<String>,
        players: Vec<RosterEntry>,
    },
}

impl RelayMessage {
    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::PlayerJoin { .. } => "player-join",
            RelayMessage::PlayerInput { .. } => "player-input",
            RelayMessage::GameState { .. } => "game-state",
            RelayMessage::StartGame { .. } => "start-game",
            RelayMessage::LevelUp { .. } => "level-up",
            RelayMessage::UpgradeSelected { .. } => "upgrade-selected",
            RelayMessage::UpgradesComplete => "upgrades-complete",
            RelayMessage::GameOver { .. } => "game-over",
            RelayMessage::RoomInfo { .. } => "room-info",
        }
    }
}

/// Serialize a relay message to its JSON text frame
pub fn encode(message: &RelayMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a JSON text frame, rejecting snapshots of another schema version
pub fn decode(frame: &str) -> Result<RelayMessage, ProtocolError> {
    let message: RelayMessage = serde_json::from_str(frame)?;
    if let RelayMessage::GameState { snapshot } = &message {
        if snapshot.version != net::SNAPSHOT_VERSION {
            return Err(ProtocolError::UnsupportedVersion(snapshot.version));
        }
    }
    Ok(message)
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_kebab_case() {
        let msg = RelayMessage::PlayerJoin {
            id: "a".into(),
            name: "Ada".into(),
            avatar: "cat.png".into(),
        };
        let json = encode(&msg).unwrap();
        assert!(json.contains(r#""type":"player-join""#));
        assert_eq!(decode(&json).unwrap(), msg);
    }

    #[test]
    fn test_unit_variant() {
        let json = encode(&RelayMessage::UpgradesComplete).unwrap();
        assert_eq!(json, r#"{"type":"upgrades-complete"}"#);
        assert_eq!(decode(&json).unwrap().kind(), "upgrades-complete");
    }

    #[test]
    fn test_input_defaults_missing_fields() {
        let msg = decode(r#"{"type":"player-input","id":"g","input":{"keys":["up","left"]}}"#).unwrap();
        match msg {
            RelayMessage::PlayerInput { input, .. } => {
                assert_eq!(input.keys, vec![Key::Up, Key::Left]);
                assert_eq!(input.aim, None);
                assert_eq!(input.seq, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"type":"no-such-thing"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(decode(r#"{"type":"start-game"}"#).is_err());
    }
}
