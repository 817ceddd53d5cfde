use std::collections::HashMap;
use std::time::Instant;

use pigserver_protocol::{PlayerId, RoomId};
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::player::{PlayerSlot, PlayerState};
use crate::room::{Room, RoomState};

/// The process-wide player and room tables.
///
/// Every mutation goes through `&mut self`, so callers hold this behind a
/// single lock (`tokio::sync::Mutex<Registry>` — see `pigserver-session`).
/// That lock is always acquired before any room-local state the caller also
/// needs to touch, matching the lock hierarchy in SPEC_FULL.md §5.
pub struct Registry {
    max_players: usize,
    players: HashMap<PlayerId, PlayerSlot>,
    rooms: Vec<Room>,
    next_player_id: u64,
}

impl Registry {
    pub fn new(max_players: usize, max_rooms: usize) -> Self {
        let rooms = (0..max_rooms as u32).map(|i| Room::new(RoomId(i))).collect();
        Registry { max_players, players: HashMap::new(), rooms, next_player_id: 0 }
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn max_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Reserve a fresh, nameless player slot for a newly accepted
    /// connection. Fails once `max_players` identities are occupied,
    /// including identities that are currently disconnected but still
    /// mid-game (their seat isn't released until they leave for good).
    pub fn add_player(&mut self, now: Instant) -> Result<PlayerId, RegistryError> {
        if self.players.len() >= self.max_players {
            warn!(target: "lobby", max_players = self.max_players, "rejecting connection, server full");
            return Err(RegistryError::ServerFull);
        }
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        self.players.insert(id, PlayerSlot::fresh(id, now));
        debug!(target: "lobby", player = %id, "player slot reserved");
        Ok(id)
    }

    /// Fully release a player's seat: removes it from any room it occupies
    /// and deletes the slot. Used for EXIT, idle eviction, and discarding a
    /// provisional slot after a reconnect splice.
    pub fn remove_player(&mut self, id: PlayerId) {
        if let Some(slot) = self.players.get(&id) {
            if let Some(room_id) = slot.room_id {
                self.remove_from_room_slots(room_id, id);
            }
        }
        self.players.remove(&id);
        info!(target: "lobby", player = %id, "player removed");
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSlot> {
        self.players.get_mut(&id)
    }

    /// Assign a nickname to a freshly-logged-in (not reconnecting) slot.
    pub fn set_nickname(&mut self, id: PlayerId, nickname: String) {
        if let Some(slot) = self.players.get_mut(&id) {
            slot.nickname = nickname;
        }
    }

    pub fn touch_activity(&mut self, id: PlayerId, now: Instant) {
        if let Some(slot) = self.players.get_mut(&id) {
            slot.last_activity = now;
        }
    }

    /// A slot with socket absent, state `InGame`, matching nickname — the
    /// unique reconnection target.
    pub fn find_disconnected(&self, nickname: &str) -> Option<PlayerId> {
        self.players
            .values()
            .find(|s| !s.connected && s.state == PlayerState::InGame && s.nickname == nickname)
            .map(|s| s.id)
    }

    /// A slot with a live socket matching nickname.
    pub fn find_active(&self, nickname: &str) -> Option<PlayerId> {
        self.players.values().find(|s| s.connected && s.nickname == nickname).map(|s| s.id)
    }

    /// Splice a reconnecting player back in: the disconnected slot regains
    /// its socket. The caller is responsible for discarding the provisional
    /// slot it was servicing with `remove_player`.
    pub fn reconnect(&mut self, id: PlayerId, now: Instant) -> Result<(), RegistryError> {
        let slot = self.players.get_mut(&id).ok_or(RegistryError::PlayerNotFound(id))?;
        slot.connected = true;
        slot.disconnected_at = None;
        slot.last_activity = now;
        Ok(())
    }

    pub fn handle_disconnect(&mut self, id: PlayerId, now: Instant) {
        if let Some(slot) = self.players.get_mut(&id) {
            slot.connected = false;
            slot.disconnected_at = Some(now);
        }
    }

    pub fn get_room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0 as usize)
    }

    pub fn get_room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id.0 as usize)
    }

    /// Rooms in stable id order, for `LIST_ROOMS`.
    pub fn list_rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Join `player` into `room_id`. Returns whether the room just became
    /// full (the caller spawns the game coordinator on `true`).
    pub fn join_room(&mut self, room_id: RoomId, player: PlayerId) -> Result<bool, RegistryError> {
        let room = self.rooms.get_mut(room_id.0 as usize).ok_or(RegistryError::RoomNotFound(room_id))?;
        if room.state != RoomState::Waiting || room.is_full() {
            return Err(RegistryError::RoomUnavailable(room_id));
        }

        let slot_idx = room.player_count;
        room.slots[slot_idx] = Some(player);
        room.player_count += 1;
        let just_filled = room.is_full();
        if just_filled {
            room.state = RoomState::InProgress;
        }

        if let Some(p) = self.players.get_mut(&player) {
            p.state = PlayerState::InGame;
            p.room_id = Some(room_id);
        }

        info!(target: "lobby", player = %player, room = %room_id, full = just_filled, "player joined room");
        Ok(just_filled)
    }

    /// Leave a room — permitted only while it's still `Waiting`.
    pub fn leave_room(&mut self, player: PlayerId) -> Result<(), RegistryError> {
        let room_id = self
            .players
            .get(&player)
            .and_then(|s| s.room_id)
            .ok_or(RegistryError::NotInRoom(player))?;

        let room = self.rooms.get_mut(room_id.0 as usize).ok_or(RegistryError::RoomNotFound(room_id))?;
        if room.state != RoomState::Waiting {
            return Err(RegistryError::GameInProgress(room_id));
        }

        self.remove_from_room_slots(room_id, player);

        if let Some(p) = self.players.get_mut(&player) {
            p.state = PlayerState::Lobby;
            p.room_id = None;
        }
        Ok(())
    }

    /// Remove a player from a room's slot array (shifting later slots down
    /// to close the gap) without touching the player's own state — used
    /// both by `leave_room` and by full-teardown removal.
    fn remove_from_room_slots(&mut self, room_id: RoomId, player: PlayerId) {
        let Some(room) = self.rooms.get_mut(room_id.0 as usize) else { return };
        let Some(pos) = room.slots.iter().position(|s| *s == Some(player)) else { return };
        for i in pos..room.player_count.saturating_sub(1) {
            room.slots[i] = room.slots[i + 1];
        }
        if room.player_count > 0 {
            room.slots[room.player_count - 1] = None;
            room.player_count -= 1;
        }
        if room.player_count == 0 && room.state != RoomState::InProgress && room.state != RoomState::Paused {
            room.state = RoomState::Waiting;
        }
    }

    /// Reset a room back to `Waiting` with no occupants and return its
    /// former occupants to `Lobby`. Called by the game coordinator's
    /// teardown sequence once a match ends.
    pub fn reset_room_after_game(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.get_mut(room_id.0 as usize) else { return };
        let occupants: Vec<PlayerId> = room.slots.iter().flatten().copied().collect();
        room.slots = Default::default();
        room.player_count = 0;
        room.state = RoomState::Waiting;
        for p in occupants {
            if let Some(slot) = self.players.get_mut(&p) {
                slot.state = PlayerState::Lobby;
                slot.room_id = None;
            }
        }
    }

    pub fn set_room_state(&mut self, room_id: RoomId, state: RoomState) {
        if let Some(room) = self.rooms.get_mut(room_id.0 as usize) {
            room.state = state;
        }
    }
}
