//! Per-room notification channel and read-buffer handoff mailbox.
//!
//! Replaces the reference server's mutex + condition-variable pair with a
//! `tokio::sync::broadcast` channel (so a wakeup is never missed just
//! because more than one task is parked on it, see SPEC_FULL.md §9) and a
//! small mailbox that carries [`LineReader`] ownership between whichever
//! task currently owns a player's socket — the connection handler or the
//! game coordinator.

use tokio::sync::{broadcast, Mutex};

use pigserver_protocol::LineReader;

/// A state-change a room's parked handlers or coordinator might be waiting
/// on. Broadcast rather than unicast: several handlers (both players, plus
/// any handler still in the waiting-room phase) can be parked on the same
/// room at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// The room just filled; a parked waiting-room handler should recheck
    /// its own state and, if it is now `InGame`, move to `InGameWait`.
    PlayerJoined,
    /// A previously hard-disconnected player's handler spliced back in;
    /// the coordinator's paused loop should resume.
    Reconnected,
    /// The match ended (win, quit, or timeout); parked handlers should
    /// return to Lobby.
    GameEnded,
    /// The room was aborted (a resume attempt failed); parked handlers
    /// should return to Lobby without a game result.
    Aborted,
}

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// The two-player mailbox slots, indexed by the room's slot index (0 or 1 —
/// see `pigserver_registry::Room::slots`).
type Mailbox<S> = Mutex<[Option<LineReader<S>>; 2]>;

/// Everything one room needs to coordinate tasks outside of the registry's
/// own lock: an event broadcaster and a socket handoff mailbox.
pub struct RoomLink<S> {
    events: broadcast::Sender<RoomEvent>,
    mailbox: Mailbox<S>,
}

impl<S> RoomLink<S> {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        RoomLink { events, mailbox: Mutex::new([None, None]) }
    }

    /// Subscribe to this room's events. Call before checking the state that
    /// makes you want to wait, so a notification sent between the check and
    /// the subscribe can't be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Best-effort notify: if nobody is listening, the event is simply
    /// dropped, which is correct — nobody was waiting on it.
    pub fn notify(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }

    /// Deposit a connection's reader into the handoff slot, to be picked up
    /// by whichever task takes over the socket next.
    pub async fn deposit(&self, slot: usize, conn: LineReader<S>) {
        let mut mailbox = self.mailbox.lock().await;
        mailbox[slot] = Some(conn);
    }

    /// Reclaim a previously deposited reader, if one is waiting.
    pub async fn take(&self, slot: usize) -> Option<LineReader<S>> {
        let mut mailbox = self.mailbox.lock().await;
        mailbox[slot].take()
    }
}

impl<S> Default for RoomLink<S> {
    fn default() -> Self {
        Self::new()
    }
}
