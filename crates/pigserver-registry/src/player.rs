use std::time::Instant;

use pigserver_protocol::{PlayerId, RoomId};

/// Lifecycle state of a player slot, independent of socket presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Idle at the top level or parked in a room that hasn't filled yet.
    Lobby,
    /// Assigned to a room that has a game coordinator (or is about to).
    InGame,
}

/// One player slot. `connected` tracks socket presence independently of
/// `state`: a slot can be `InGame` with `connected == false` (a disconnected
/// in-game player awaiting reconnection), which is exactly what makes it the
/// unique splice target for [`crate::Registry::find_disconnected`].
///
/// Slots are keyed by [`PlayerId`] in the registry and occupy a seat against
/// `max_players` for as long as they exist — including while disconnected
/// and mid-game, since the original lobby only frees a seat on explicit
/// removal (EXIT, idle eviction, reconnect timeout), never merely on socket
/// loss.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub id: PlayerId,
    pub nickname: String,
    pub state: PlayerState,
    pub room_id: Option<RoomId>,
    pub connected: bool,
    pub disconnected_at: Option<Instant>,
    pub last_activity: Instant,
}

impl PlayerSlot {
    pub(crate) fn fresh(id: PlayerId, now: Instant) -> Self {
        PlayerSlot {
            id,
            nickname: String::new(),
            state: PlayerState::Lobby,
            room_id: None,
            connected: true,
            disconnected_at: None,
            last_activity: now,
        }
    }
}
