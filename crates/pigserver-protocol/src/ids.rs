use std::fmt;

/// A room's fixed slot index, `0..MAX_ROOMS`. Rooms are allocated once at
/// startup and never destroyed, so this doubles as the room's permanent
/// identity for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RoomId {
    fn from(value: u32) -> Self {
        RoomId(value)
    }
}

/// A player slot's identity within the registry. Never sent over the wire —
/// nicknames are the client-visible identity (see [`crate::NICKNAME_LEN`]);
/// this id exists only so internal code can refer to a slot unambiguously
/// across reconnection splices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}
