//! The per-room game coordinator: spawned once a room fills, torn down
//! once the match ends.
//!
//! Owns both players' [`LineReader`]s and the match's [`GameState`] for the
//! lifetime of one game — nobody else touches either while this task runs.
//! Replaces the reference server's pthread_cond_wait dance with a
//! `tokio::select!` over both sockets, the room's event channel, and a
//! reconnect-deadline timer (SPEC_FULL.md §4.5.2, §9).

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::Receiver;
use tracing::{info, warn};

use pigserver_game::GameState;
use pigserver_protocol::{
    parse_command, ClientCommand, ErrorKind, LineReader, PlayerId, ReceiveOutcome, RoomId,
    ServerMessage, IDLE_TIMEOUT, RECONNECT_TIMEOUT,
};
use pigserver_registry::RoomState;

use crate::handler::send_msg;
use crate::room_link::{RoomEvent, RoomLink};
use crate::shared::SharedState;

type Seat = usize;

const SOCKET_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAILBOX_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why the match is currently paused.
#[derive(Debug, Clone, Copy)]
enum PauseCause {
    /// `seat`'s socket closed outright; only a `RESUME` splice can revive it.
    HardDisconnect(Seat),
    /// Both sockets are still open but `seat` has gone quiet past
    /// `IDLE_TIMEOUT`; the next line it sends resumes the match.
    Idle(Seat),
}

impl PauseCause {
    fn seat(self) -> Seat {
        match self {
            PauseCause::HardDisconnect(s) | PauseCause::Idle(s) => s,
        }
    }
}

/// Spawn the game coordinator task for a room that just filled. Returns
/// immediately; the match runs to completion on its own task.
pub fn spawn_game<S>(shared: Arc<SharedState<S>>, room_id: RoomId)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        run_game(shared, room_id).await;
    });
}

async fn run_game<S>(shared: Arc<SharedState<S>>, room_id: RoomId)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let link = shared.room_link(room_id);

    let (ids, nicks) = {
        let reg = shared.registry.lock().await;
        let room = reg.get_room(room_id).expect("coordinator spawned for a nonexistent room");
        let ids = [
            room.slots[0].expect("room must be full when the coordinator spawns"),
            room.slots[1].expect("room must be full when the coordinator spawns"),
        ];
        let nicks = [
            reg.get_player(ids[0]).map(|p| p.nickname.clone()).unwrap_or_default(),
            reg.get_player(ids[1]).map(|p| p.nickname.clone()).unwrap_or_default(),
        ];
        (ids, nicks)
    };

    let mut readers: [Option<LineReader<S>>; 2] =
        [Some(await_deposit(&link, 0).await), Some(await_deposit(&link, 1).await)];

    let mut game = GameState::init(seed_for(room_id));
    info!(target: "game", room = %room_id, p0 = %ids[0], p1 = %ids[1], "match starting");

    for seat in 0..2 {
        let msg = ServerMessage::GameStart {
            opp_nick: nicks[1 - seat].clone(),
            your_turn: seat == game.current_player,
        };
        if let Some(r) = &mut readers[seat] {
            let _ = send_msg(r, &msg).await;
        }
    }

    let mut last_activity = [Instant::now(); 2];
    let mut events = link.subscribe();
    let mut pause: Option<PauseCause> = None;
    let mut pause_deadline = Instant::now();

    while !game.game_over {
        match pause {
            None => {
                run_active_tick(&ids, &shared, &mut readers, &mut game, &mut last_activity, &mut events)
                    .await;
                if let Some(cause) = just_paused(&shared, room_id, &ids, &mut readers, &mut last_activity).await {
                    pause = Some(cause);
                    pause_deadline = Instant::now() + RECONNECT_TIMEOUT;
                }
            }
            Some(cause) => {
                if Instant::now() >= pause_deadline {
                    finalize_timeout(&mut readers, &mut game, cause).await;
                    break;
                }
                let resumed =
                    run_pause_tick(&shared, room_id, &ids, &link, &mut readers, &mut game, &mut last_activity, &mut events, cause)
                        .await;
                if resumed {
                    pause = None;
                } else if game_aborted(&shared, room_id).await {
                    game.game_over = true;
                    break;
                }
            }
        }
    }

    info!(target: "game", room = %room_id, winner = ?game.winner, "match ended");
    {
        let mut reg = shared.registry.lock().await;
        reg.reset_room_after_game(room_id);
    }
    for (seat, slot) in readers.into_iter().enumerate() {
        if let Some(r) = slot {
            link.deposit(seat, r).await;
        }
    }
    link.notify(RoomEvent::GameEnded);
}

async fn game_aborted<S>(shared: &Arc<SharedState<S>>, room_id: RoomId) -> bool {
    let reg = shared.registry.lock().await;
    reg.get_room(room_id).map(|r| r.state == RoomState::Aborted).unwrap_or(false)
}

/// Race both sockets and the room's event channel; dispatch whichever
/// resolves first. Disconnects and idle stalls are only *recorded* here
/// (in `readers`/registry `connected`); the caller decides whether that
/// adds up to a fresh pause via [`just_paused`].
async fn run_active_tick<S>(
    ids: &[PlayerId; 2],
    shared: &Arc<SharedState<S>>,
    readers: &mut [Option<LineReader<S>>; 2],
    game: &mut GameState,
    last_activity: &mut [Instant; 2],
    events: &mut Receiver<RoomEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        out = recv_from(&mut readers[0], SOCKET_POLL_INTERVAL) => {
            handle_socket_event(ids, shared, readers, game, last_activity, 0, out).await;
        }
        out = recv_from(&mut readers[1], SOCKET_POLL_INTERVAL) => {
            handle_socket_event(ids, shared, readers, game, last_activity, 1, out).await;
        }
        ev = events.recv() => {
            if matches!(ev, Ok(RoomEvent::Aborted)) {
                game.game_over = true;
            }
        }
    }
}

async fn handle_socket_event<S>(
    ids: &[PlayerId; 2],
    shared: &Arc<SharedState<S>>,
    readers: &mut [Option<LineReader<S>>; 2],
    game: &mut GameState,
    last_activity: &mut [Instant; 2],
    seat: Seat,
    outcome: ReceiveOutcome,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match outcome {
        ReceiveOutcome::Line(line) => {
            last_activity[seat] = Instant::now();
            if handle_line(game, readers, seat, &line).await {
                broadcast_outcome(readers, game).await;
            }
        }
        ReceiveOutcome::Disconnect | ReceiveOutcome::IoError(_) => {
            readers[seat] = None;
        }
        ReceiveOutcome::Overflow => {
            warn!(target: "game", player = %ids[seat], "in-game line overflowed the read buffer, dropping it");
        }
        ReceiveOutcome::Timeout => {
            if shared.is_killed(ids[seat]) {
                readers[seat] = None;
                {
                    let mut reg = shared.registry.lock().await;
                    reg.remove_player(ids[seat]);
                }
                shared.forget(ids[seat]);
            }
        }
    }
}

/// Having just ticked the active loop, decide whether the match is now
/// paused: a seat's reader went away (hard disconnect, including a
/// kill-flag teardown) or a still-connected seat has gone idle too long.
async fn just_paused<S>(
    shared: &Arc<SharedState<S>>,
    room_id: RoomId,
    ids: &[PlayerId; 2],
    readers: &mut [Option<LineReader<S>>; 2],
    last_activity: &mut [Instant; 2],
) -> Option<PauseCause>
where
    S: AsyncWrite + Unpin,
{
    let cause = if readers[0].is_none() {
        Some(PauseCause::HardDisconnect(0))
    } else if readers[1].is_none() {
        Some(PauseCause::HardDisconnect(1))
    } else if last_activity[0].elapsed() >= IDLE_TIMEOUT {
        Some(PauseCause::Idle(0))
    } else if last_activity[1].elapsed() >= IDLE_TIMEOUT {
        Some(PauseCause::Idle(1))
    } else {
        None
    };

    let Some(cause) = cause else { return None };
    let seat = cause.seat();

    {
        let mut reg = shared.registry.lock().await;
        if matches!(cause, PauseCause::HardDisconnect(_)) {
            reg.handle_disconnect(ids[seat], Instant::now());
        }
        reg.set_room_state(room_id, RoomState::Paused);
    }
    if let Some(r) = &mut readers[1 - seat] {
        let _ = send_msg(r, &ServerMessage::OpponentDisconnected).await;
    }
    Some(cause)
}

/// One iteration of the paused state: wait (up to the remaining deadline)
/// for either a reconnect event (hard-disconnect case) or the stalled
/// player's own next line (idle case). Returns whether the match resumed.
#[allow(clippy::too_many_arguments)]
async fn run_pause_tick<S>(
    shared: &Arc<SharedState<S>>,
    room_id: RoomId,
    ids: &[PlayerId; 2],
    link: &RoomLink<S>,
    readers: &mut [Option<LineReader<S>>; 2],
    game: &mut GameState,
    last_activity: &mut [Instant; 2],
    events: &mut Receiver<RoomEvent>,
    cause: PauseCause,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match cause {
        PauseCause::HardDisconnect(seat) => {
            tokio::select! {
                ev = events.recv() => {
                    if matches!(ev, Ok(RoomEvent::Reconnected)) {
                        if let Some(new_reader) = link.take(seat).await {
                            readers[seat] = Some(new_reader);
                            last_activity[seat] = Instant::now();
                            let msg = game_state_msg(game, seat);
                            if let Some(r) = &mut readers[seat] {
                                let _ = send_msg(r, &msg).await;
                            }
                            if let Some(r) = &mut readers[1 - seat] {
                                let _ = send_msg(r, &ServerMessage::OpponentReconnected).await;
                            }
                            true
                        } else {
                            false
                        }
                    } else {
                        false
                    }
                }
                _ = tokio::time::sleep(SOCKET_POLL_INTERVAL) => false,
            }
        }
        PauseCause::Idle(seat) => {
            tokio::select! {
                out = recv_from(&mut readers[seat], SOCKET_POLL_INTERVAL) => {
                    match out {
                        ReceiveOutcome::Line(line) => {
                            last_activity[seat] = Instant::now();
                            {
                                let mut reg = shared.registry.lock().await;
                                reg.set_room_state(room_id, RoomState::InProgress);
                            }
                            if let Some(r) = &mut readers[1 - seat] {
                                let _ = send_msg(r, &ServerMessage::OpponentReconnected).await;
                            }
                            if handle_line(game, readers, seat, &line).await {
                                broadcast_outcome(readers, game).await;
                            }
                            true
                        }
                        ReceiveOutcome::Disconnect | ReceiveOutcome::IoError(_) => {
                            readers[seat] = None;
                            let mut reg = shared.registry.lock().await;
                            reg.handle_disconnect(ids[seat], Instant::now());
                            false
                        }
                        ReceiveOutcome::Timeout | ReceiveOutcome::Overflow => false,
                    }
                }
                _ = events.recv() => false,
            }
        }
    }
}

async fn finalize_timeout<S>(readers: &mut [Option<LineReader<S>>; 2], game: &mut GameState, cause: PauseCause)
where
    S: AsyncWrite + Unpin,
{
    let stalled = cause.seat();
    let winner = 1 - stalled;
    game.force_end(winner);

    if let Some(r) = &mut readers[winner] {
        let _ = send_msg(r, &ServerMessage::GameWin { msg: Some("Your opponent timed out.".to_string()) }).await;
    }
    if matches!(cause, PauseCause::Idle(_)) {
        if let Some(r) = &mut readers[stalled] {
            let _ = send_msg(r, &ServerMessage::Disconnected).await;
            let _ = send_msg(r, &ServerMessage::GameLose).await;
        }
    }
}

fn game_state_msg(game: &GameState, seat: Seat) -> ServerMessage {
    ServerMessage::GameState {
        my_score: game.scores[seat],
        opp_score: game.scores[1 - seat],
        turn_score: game.turn_score,
        roll: game.last_roll,
        your_turn: game.current_player == seat,
    }
}

async fn broadcast_outcome<S>(readers: &mut [Option<LineReader<S>>; 2], game: &GameState)
where
    S: AsyncWrite + Unpin,
{
    if game.game_over {
        let winner = game.winner.unwrap_or(0);
        let loser = 1 - winner;
        if let Some(r) = &mut readers[winner] {
            let _ = send_msg(r, &ServerMessage::GameWin { msg: None }).await;
        }
        if let Some(r) = &mut readers[loser] {
            let _ = send_msg(r, &ServerMessage::GameLose).await;
        }
    } else {
        for seat in 0..2 {
            let msg = game_state_msg(game, seat);
            if let Some(r) = &mut readers[seat] {
                let _ = send_msg(r, &msg).await;
            }
        }
    }
}

/// Apply one in-game line. Returns whether game state changed in a way
/// that needs a `GAME_STATE`/`GAME_WIN`/`GAME_LOSE` broadcast.
async fn handle_line<S>(
    game: &mut GameState,
    readers: &mut [Option<LineReader<S>>; 2],
    seat: Seat,
    line: &str,
) -> bool
where
    S: AsyncWrite + Unpin,
{
    match parse_command(line) {
        Ok(ClientCommand::Quit) => {
            game.force_end(1 - seat);
            true
        }
        Ok(ClientCommand::Ping) => {
            if let Some(r) = &mut readers[seat] {
                let _ = send_msg(r, &ServerMessage::ok("PING")).await;
            }
            false
        }
        Ok(ClientCommand::GameStateRequest) => {
            let msg = game_state_msg(game, seat);
            if let Some(r) = &mut readers[seat] {
                let _ = send_msg(r, &msg).await;
            }
            false
        }
        Ok(ClientCommand::LeaveRoom) => {
            if let Some(r) = &mut readers[seat] {
                let _ = send_msg(r, &ServerMessage::error(ErrorKind::GameInProgress)).await;
            }
            false
        }
        Ok(ClientCommand::Roll) if seat == game.current_player => {
            game.roll();
            true
        }
        Ok(ClientCommand::Hold) if seat == game.current_player => {
            game.hold();
            true
        }
        Ok(ClientCommand::Roll) | Ok(ClientCommand::Hold) => {
            if let Some(r) = &mut readers[seat] {
                let _ = send_msg(r, &ServerMessage::error(ErrorKind::InvalidCommand)).await;
            }
            false
        }
        _ => {
            warn!(target: "game", seat, line, "ignoring malformed or unrecognized in-game command");
            false
        }
    }
}

async fn recv_from<S>(slot: &mut Option<LineReader<S>>, timeout: Duration) -> ReceiveOutcome
where
    S: AsyncRead + Unpin,
{
    match slot {
        Some(r) => r.receive_line(timeout).await,
        None => std::future::pending().await,
    }
}

async fn await_deposit<S>(link: &RoomLink<S>, slot: usize) -> LineReader<S> {
    loop {
        if let Some(r) = link.take(slot).await {
            return r;
        }
        tokio::time::sleep(MAILBOX_POLL_INTERVAL).await;
    }
}

fn seed_for(room_id: RoomId) -> u64 {
    let nanos =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0);
    nanos ^ (room_id.0 as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    #[test]
    fn seed_differs_by_room() {
        assert_ne!(seed_for(RoomId(0)), seed_for(RoomId(1)));
    }

    #[test]
    fn pause_cause_reports_its_seat() {
        assert_eq!(PauseCause::HardDisconnect(1).seat(), 1);
        assert_eq!(PauseCause::Idle(0).seat(), 0);
    }

    async fn read_line(client: &mut DuplexStream) -> String {
        let mut buf = [0u8; 256];
        let n = client.read(&mut buf).await.expect("read");
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    /// S4's reconnect-timeout forfeit, exercised directly rather than by
    /// waiting out a real `RECONNECT_TIMEOUT` wall-clock deadline: the
    /// still-connected player wins and is told their opponent timed out.
    #[tokio::test]
    async fn finalize_timeout_hard_disconnect_declares_the_connected_player_winner() {
        let (mut winner_client, winner_server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] =
            [Some(LineReader::new(winner_server)), None];
        let mut game = GameState::init(1);

        finalize_timeout(&mut readers, &mut game, PauseCause::HardDisconnect(1)).await;

        assert!(game.game_over);
        assert_eq!(game.winner, Some(0));
        let msg = read_line(&mut winner_client).await;
        assert!(msg.starts_with("GAME_WIN|msg:Your opponent timed out."), "{msg}");
    }

    /// The idle-timeout variant additionally tells the stalled player they
    /// were disconnected before declaring them the loser.
    #[tokio::test]
    async fn finalize_timeout_idle_notifies_the_stalled_player_before_losing() {
        let (mut winner_client, winner_server) = duplex(256);
        let (mut stalled_client, stalled_server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] =
            [Some(LineReader::new(winner_server)), Some(LineReader::new(stalled_server))];
        let mut game = GameState::init(2);

        finalize_timeout(&mut readers, &mut game, PauseCause::Idle(1)).await;

        assert_eq!(game.winner, Some(0));
        let winner_msg = read_line(&mut winner_client).await;
        assert!(winner_msg.starts_with("GAME_WIN"), "{winner_msg}");
        let stalled_msg = read_line(&mut stalled_client).await;
        assert!(stalled_msg.contains("DISCONNECTED") && stalled_msg.contains("GAME_LOSE"), "{stalled_msg}");
    }

    /// A hard disconnect on one seat flips the room to `Paused` and tells
    /// the opponent, without touching the other seat's reader.
    #[tokio::test]
    async fn just_paused_detects_a_dropped_reader_and_notifies_the_opponent() {
        let shared: Arc<SharedState<DuplexStream>> = Arc::new(SharedState::new(10, 5));
        let ids = [PlayerId(0), PlayerId(1)];
        let (mut opp_client, opp_server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] =
            [None, Some(LineReader::new(opp_server))];
        let mut last_activity = [Instant::now(); 2];

        let cause = just_paused(&shared, RoomId(0), &ids, &mut readers, &mut last_activity).await;

        assert!(matches!(cause, Some(PauseCause::HardDisconnect(0))));
        let reg = shared.registry.lock().await;
        assert_eq!(reg.get_room(RoomId(0)).unwrap().state, RoomState::Paused);
        drop(reg);
        assert_eq!(read_line(&mut opp_client).await, "OPPONENT_DISCONNECTED\n");
    }

    /// Once a reconnecting handler deposits a fresh reader into the room's
    /// mailbox and fires `Reconnected`, a hard-disconnect pause resumes:
    /// the reconnected seat gets a fresh `GAME_STATE` and the opponent is
    /// told the peer is back.
    #[tokio::test]
    async fn run_pause_tick_hard_disconnect_resumes_on_reconnect_event() {
        let shared: Arc<SharedState<DuplexStream>> = Arc::new(SharedState::new(10, 5));
        let link = shared.room_link(RoomId(0));

        let (mut reconnect_client, reconnect_server) = duplex(256);
        link.deposit(0, LineReader::new(reconnect_server)).await;

        let (mut opp_client, opp_server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] =
            [None, Some(LineReader::new(opp_server))];
        let mut game = GameState::init(3);
        let mut last_activity = [Instant::now(); 2];
        let ids = [PlayerId(0), PlayerId(1)];

        let mut events = link.subscribe();
        link.notify(RoomEvent::Reconnected);

        let resumed = run_pause_tick(
            &shared,
            RoomId(0),
            &ids,
            &link,
            &mut readers,
            &mut game,
            &mut last_activity,
            &mut events,
            PauseCause::HardDisconnect(0),
        )
        .await;

        assert!(resumed);
        assert!(readers[0].is_some(), "the reconnected reader should be back in its seat");
        let reconnect_msg = read_line(&mut reconnect_client).await;
        assert!(reconnect_msg.starts_with("GAME_STATE|"), "{reconnect_msg}");
        assert_eq!(read_line(&mut opp_client).await, "OPPONENT_RECONNECTED\n");
    }

    /// `ROLL`/`HOLD` from the seat whose turn it isn't are rejected without
    /// mutating `GameState` (SPEC_FULL.md §8's out-of-turn invariant, S6).
    #[tokio::test]
    async fn handle_line_rejects_out_of_turn_roll_and_hold() {
        let (mut client, server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] = [Some(LineReader::new(server)), None];
        let mut game = GameState::init(4);
        let other_seat = 1 - game.current_player;

        let changed = handle_line(&mut game, &mut readers, other_seat, "ROLL").await;
        assert!(!changed);
        assert_eq!(game.turn_score, 0);
        assert_eq!(game.last_roll, 0);

        // only readers[other_seat] (seat 0 here, since readers[1] is None)
        // would receive the error; skip the read if seat 0 isn't the one we
        // dispatched as, to keep the assertion meaningful regardless of
        // which seat GameState::init(4) happened to start on.
        if other_seat == 0 {
            let msg = read_line(&mut client).await;
            assert_eq!(msg, "ERROR|msg:INVALID_COMMAND\n");
        }
    }

    /// `QUIT` ends the match immediately with the other seat as winner,
    /// regardless of whose turn it is.
    #[tokio::test]
    async fn handle_line_quit_force_ends_in_the_other_seats_favor() {
        let (_client, server) = duplex(256);
        let mut readers: [Option<LineReader<DuplexStream>>; 2] = [Some(LineReader::new(server)), None];
        let mut game = GameState::init(5);

        let changed = handle_line(&mut game, &mut readers, 0, "QUIT").await;

        assert!(changed);
        assert!(game.game_over);
        assert_eq!(game.winner, Some(1));
    }
}
