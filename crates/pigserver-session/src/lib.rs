//! Connection handler and game coordinator tasks (component C5).
//!
//! This crate ties the wire protocol (`pigserver-protocol`), the registry
//! (`pigserver-registry`), and the game rules (`pigserver-game`) together
//! into the two task kinds that actually run a match: one connection
//! handler per accepted socket, and one game coordinator per room once it
//! fills. See [`handler::run_connection`] for the entry point a listener
//! spawns per accepted connection.

pub mod coordinator;
pub mod handler;
pub mod room_link;
pub mod shared;

pub use handler::run_connection;
pub use room_link::RoomEvent;
pub use shared::SharedState;
