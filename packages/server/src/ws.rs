//! Live game WebSocket endpoint.
//!
//! Every connection gets a numeric id and exchanges JSON events shaped as
//! `{"event": "<name>", "payload": <body>}`.

pub mod api;
pub mod handler;
pub mod server;

pub use booxclash_game_models::{ConnId, RoomId};

/// Serialized event sent to a connection.
pub type Msg = String;
