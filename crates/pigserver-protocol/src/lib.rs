//! Wire protocol for pigserver: an ASCII, line-delimited, key-value format.
//!
//! ```text
//! COMMAND[|key1:value1[|key2:value2]...]\n
//! ```
//!
//! This crate owns framing (read-side buffering and line extraction, via
//! [`codec::LineReader`]), parsing ([`command::parse_command`]), and
//! encoding of every server-originated message shape ([`message::ServerMessage`]).
//! It knows nothing about registries, rooms, or game rules — those live in
//! `pigserver-registry` and `pigserver-game`.

pub mod codec;
pub mod command;
pub mod constants;
pub mod error;
pub mod ids;
pub mod message;

pub use codec::{LineReader, ReceiveOutcome};
pub use command::{parse_command, parse_raw, ClientCommand, RawCommand};
pub use constants::*;
pub use error::ProtocolError;
pub use ids::{PlayerId, RoomId};
pub use message::{ErrorKind, RoomStateWire, ServerMessage};
