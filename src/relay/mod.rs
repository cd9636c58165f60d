//! Message relay between co-op peers
//!
//! Rooms of two, first joiner hosts. The relay never looks inside the
//! simulation; it only tracks who is connected and where frames go.

pub mod hub;
pub mod player;
pub mod room;

pub use hub::{RelayError, RelayHandle, RelayLink};
pub use player::{ConnectionId, RelayPlayer};
pub use room::{Room, RoomError, MAX_PLAYERS};
