use pigserver_protocol::{PlayerId, RoomId, RoomStateWire, MAX_PLAYERS_PER_ROOM};

/// A room's lifecycle state. Rooms are never destroyed — they cycle between
/// these states for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    InProgress,
    Paused,
    Aborted,
}

impl RoomState {
    pub fn to_wire(self) -> RoomStateWire {
        match self {
            RoomState::Waiting => RoomStateWire::Waiting,
            RoomState::InProgress => RoomStateWire::InProgress,
            RoomState::Paused => RoomStateWire::Paused,
            RoomState::Aborted => RoomStateWire::Aborted,
        }
    }
}

/// A fixed-identity room. The slot array preserves join order: whoever
/// joined first is always index 0, which the game engine relies on to seed
/// `current_player`.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub state: RoomState,
    pub slots: [Option<PlayerId>; MAX_PLAYERS_PER_ROOM],
    pub player_count: usize,
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Room { id, state: RoomState::Waiting, slots: [None; MAX_PLAYERS_PER_ROOM], player_count: 0 }
    }

    pub fn is_full(&self) -> bool {
        self.player_count >= MAX_PLAYERS_PER_ROOM
    }
}
