//! Networking: relay messages, snapshot codec and the two replication roles

pub mod codec;
pub mod game_session;
pub mod guest;
pub mod host;
pub mod protocol;
