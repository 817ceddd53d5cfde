//! State shared by every connection handler and game coordinator task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use pigserver_protocol::{PlayerId, RoomId};
use pigserver_registry::Registry;

use crate::room_link::RoomLink;

/// Everything one running server instance hands to its tasks: the
/// registry (SPEC_FULL.md §5's single lock-protected player/room table)
/// and one [`RoomLink`] per room, allocated once at startup alongside the
/// registry's own room slots and indexed the same way.
///
/// Also tracks a "kill flag" per player id, used to tear down a still-live
/// session whose nickname a newcomer has just claimed (SPEC_FULL.md
/// §4.5.1(3a)). A plain `AtomicBool` rather than a wakeup primitive: every
/// loop that owns a player's socket already wakes on a bounded period —
/// `SOCKET_READ_TIMEOUT` in LoginWait/ResumeWait, `PARK_POLL_INTERVAL` while
/// parked waiting for a room to fill or a match to end, `IDLE_TIMEOUT / 2`
/// in bare Lobby, `SOCKET_POLL_INTERVAL` in the game coordinator — so
/// polling the flag there is enough, and it avoids the missed-wakeup hazard
/// of notifying a task that is not currently awaiting.
pub struct SharedState<S> {
    pub registry: Mutex<Registry>,
    rooms: Vec<Arc<RoomLink<S>>>,
    kill_flags: StdMutex<HashMap<PlayerId, Arc<AtomicBool>>>,
}

impl<S> SharedState<S> {
    pub fn new(max_players: usize, max_rooms: usize) -> Self {
        let rooms = (0..max_rooms).map(|_| Arc::new(RoomLink::new())).collect();
        SharedState {
            registry: Mutex::new(Registry::new(max_players, max_rooms)),
            rooms,
            kill_flags: StdMutex::new(HashMap::new()),
        }
    }

    pub fn room_link(&self, id: RoomId) -> Arc<RoomLink<S>> {
        Arc::clone(&self.rooms[id.0 as usize])
    }

    pub fn max_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// The kill flag for `id`, created on first use. Cheap to call on
    /// every login since a stale flag for a never-colliding player is just
    /// a few bytes that live for the process lifetime — the registry
    /// already bounds the number of distinct ids that can ever exist to
    /// `max_players` worth of churn per reconnect-timeout window, not an
    /// unbounded set.
    pub fn kill_flag(&self, id: PlayerId) -> Arc<AtomicBool> {
        let mut flags = self.kill_flags.lock().expect("kill_flags mutex poisoned");
        Arc::clone(flags.entry(id).or_insert_with(|| Arc::new(AtomicBool::new(false))))
    }

    /// Mark `id` for teardown. The task currently servicing that player's
    /// socket observes this on its next loop tick and exits as though the
    /// peer had disconnected.
    pub fn mark_killed(&self, id: PlayerId) {
        self.kill_flag(id).store(true, Ordering::SeqCst);
    }

    pub fn is_killed(&self, id: PlayerId) -> bool {
        self.kill_flag(id).load(Ordering::SeqCst)
    }

    /// Drop the bookkeeping for a player id that will never be reused
    /// (slots get fresh ids from a monotonic counter, so this is safe).
    pub fn forget(&self, id: PlayerId) {
        self.kill_flags.lock().expect("kill_flags mutex poisoned").remove(&id);
    }
}
