//! Protocol and timing constants shared across the workspace.

use std::time::Duration;

/// Points needed to win a game.
pub const WINNING_SCORE: u32 = 30;

/// Players per room (Pig is strictly two-player).
pub const MAX_PLAYERS_PER_ROOM: usize = 2;

/// Max visible nickname length in bytes (31, the 32nd reserved for the
/// historical C null terminator; kept as the byte bound clients are held to).
pub const NICKNAME_LEN: usize = 32;

/// Max bytes of one complete wire message, terminator included.
pub const MSG_MAX_LEN: usize = 256;

/// Per-connection read buffer capacity: twice MSG_MAX_LEN, so one pending
/// partial message plus one full message can coexist before overflow.
pub const READ_BUFFER_LEN: usize = MSG_MAX_LEN * 2;

/// Max key:value argument pairs accepted after the verb.
pub const MAX_ARGS: usize = 5;

pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(20);
pub const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Per-read socket timeout; distinguishes a stalled peer from a closed one.
pub const SOCKET_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default listening port.
pub const DEFAULT_PORT: u16 = 12345;
