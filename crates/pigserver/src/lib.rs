//! # pigserver
//!
//! The Pig dice game server: a TCP accept loop that hands each connection
//! to [`pigserver_session::run_connection`], plus the CLI surface,
//! four-sink logging, and top-level error type that bind the rest of the
//! workspace (`pigserver-protocol`, `pigserver-registry`,
//! `pigserver-session`) into a runnable binary.

pub mod cli;
pub mod error;
pub mod logging;
pub mod server;

pub use cli::Args;
pub use error::PigServerError;
