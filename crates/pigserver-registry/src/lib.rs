//! Process-wide player and room tables (component C3).
//!
//! This crate owns slot allocation, nickname lookups, and room membership.
//! It has no knowledge of sockets, game rules, or async tasks — those are
//! the session coordinator's job (`pigserver-session`), which holds one
//! `Registry` behind a lock shared by every connection handler and game
//! coordinator in the process.

pub mod error;
pub mod manager;
pub mod player;
pub mod room;

pub use error::RegistryError;
pub use manager::Registry;
pub use player::{PlayerSlot, PlayerState};
pub use room::{Room, RoomState};
