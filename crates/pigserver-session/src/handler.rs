//! The per-connection handler task: one spawned per accepted socket.
//!
//! Drives a connection through `Welcome -> LoginWait -> IdentityResolve ->
//! (ResumeWait | Lobby/InGameWait)`, handing its [`LineReader`] off to the
//! room's game coordinator whenever the player enters a game in progress,
//! and reclaiming it when the match ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use pigserver_protocol::{
    parse_command, ClientCommand, ErrorKind, LineReader, PlayerId, ReceiveOutcome, RoomId,
    ServerMessage, IDLE_TIMEOUT, NICKNAME_LEN, SOCKET_READ_TIMEOUT,
};
use pigserver_registry::{PlayerState, RoomState};

use crate::coordinator::spawn_game;
use crate::room_link::RoomEvent;
use crate::shared::SharedState;

/// How often a parked handler wakes to recheck room state and its own
/// kill flag, in both the "room not yet full" and "game in progress"
/// sub-phases of InGameWait (spec.md §4.5.1 step 6).
const PARK_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) async fn send_msg<S>(reader: &mut LineReader<S>, msg: &ServerMessage) -> bool
where
    S: AsyncWrite + Unpin,
{
    match msg.encode() {
        Ok(line) => reader.send(line.as_bytes()).await.is_ok(),
        Err(e) => {
            warn!(target: "server", error = %e, "refusing to send a message that failed to encode");
            false
        }
    }
}

/// Drive one accepted connection to completion. Ordinary protocol-level
/// endings (bad login, disconnect, EXIT) are not errors — just a closed
/// connection; I/O failures on the handler's own socket are likewise
/// swallowed and logged here, matching SPEC_FULL.md §7's propagation
/// policy that a single connection's I/O failure is local to it.
pub async fn run_connection<S>(stream: S, shared: Arc<SharedState<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = LineReader::new(stream);

    let (max_players, max_rooms) = {
        let reg = shared.registry.lock().await;
        (reg.max_players(), reg.max_rooms())
    };
    if !send_msg(&mut reader, &ServerMessage::Welcome { max_players, max_rooms }).await {
        return;
    }

    let provisional_id = {
        let mut reg = shared.registry.lock().await;
        match reg.add_player(Instant::now()) {
            Ok(id) => id,
            Err(_) => {
                let _ = send_msg(&mut reader, &ServerMessage::error(ErrorKind::ServerFull)).await;
                return;
            }
        }
    };

    let Some(nick) = login_wait(&mut reader, &shared, provisional_id).await else { return };

    match resolve_identity(reader, &shared, provisional_id, nick).await {
        ResolveOutcome::Fresh(reader, id) => {
            play_lobby(reader, shared, id).await;
        }
        ResolveOutcome::Reconnected(room_id, slot_idx, id) => {
            if let Some(reader) = park_until_game_ends(&shared, room_id, slot_idx, id).await {
                play_lobby(reader, shared, id).await;
            }
        }
        ResolveOutcome::Closed => {}
    }
}

enum ResolveOutcome<S> {
    Fresh(LineReader<S>, PlayerId),
    /// The reader has already been deposited into the room's mailbox by
    /// `resume_wait`; the caller only needs the identity to park on it.
    Reconnected(RoomId, usize, PlayerId),
    Closed,
}

/// LoginWait: read lines until one arrives (or the peer goes away) — a
/// read timeout here is not itself an error, only the absence of *any*
/// line ever arriving is. Validates shape and nickname length; identity
/// resolution against the registry happens separately in `resolve_identity`.
async fn login_wait<S>(
    reader: &mut LineReader<S>,
    shared: &Arc<SharedState<S>>,
    provisional_id: PlayerId,
) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match reader.receive_line(SOCKET_READ_TIMEOUT).await {
            ReceiveOutcome::Line(line) => {
                return match parse_command(&line) {
                    Ok(ClientCommand::Login { nick }) if is_valid_nickname(&nick) => Some(nick),
                    Ok(ClientCommand::Login { .. }) => {
                        let _ = send_msg(
                            reader,
                            &ServerMessage::error_for(ErrorKind::InvalidNickname, "LOGIN"),
                        )
                        .await;
                        discard_provisional(shared, provisional_id).await;
                        None
                    }
                    _ => {
                        let _ =
                            send_msg(reader, &ServerMessage::error(ErrorKind::InvalidCommand)).await;
                        discard_provisional(shared, provisional_id).await;
                        None
                    }
                };
            }
            ReceiveOutcome::Timeout => continue,
            ReceiveOutcome::Disconnect | ReceiveOutcome::Overflow | ReceiveOutcome::IoError(_) => {
                discard_provisional(shared, provisional_id).await;
                return None;
            }
        }
    }
}

fn is_valid_nickname(nick: &str) -> bool {
    !nick.is_empty() && nick.len() < NICKNAME_LEN
}

async fn discard_provisional<S>(shared: &Arc<SharedState<S>>, id: PlayerId) {
    let mut reg = shared.registry.lock().await;
    reg.remove_player(id);
}

/// IdentityResolve (spec.md §4.5.1 step 3).
async fn resolve_identity<S>(
    mut reader: LineReader<S>,
    shared: &Arc<SharedState<S>>,
    provisional_id: PlayerId,
    nick: String,
) -> ResolveOutcome<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reg = shared.registry.lock().await;

    if let Some(active_id) = reg.find_active(&nick) {
        warn!(target: "lobby", %nick, "nickname already in use, tearing down the prior session");
        let mid_game_room =
            reg.get_player(active_id).filter(|p| p.state == PlayerState::InGame).and_then(|p| p.room_id);
        match mid_game_room {
            // The prior session is mid-match: evict it the same way a real
            // socket drop would (mark disconnected, pause the room) instead
            // of ripping its slot out from under the room's player_count
            // right now. The coordinator's own reconnect-timeout path
            // forfeits the match to the opponent once nobody resumes under
            // this identity, and clears the seat then.
            Some(room_id) => {
                reg.handle_disconnect(active_id, Instant::now());
                reg.set_room_state(room_id, RoomState::Paused);
            }
            None => reg.remove_player(active_id),
        }
        reg.remove_player(provisional_id);
        shared.mark_killed(active_id);
        drop(reg);
        let _ = send_msg(&mut reader, &ServerMessage::error_for(ErrorKind::NicknameInUse, "LOGIN")).await;
        return ResolveOutcome::Closed;
    }

    if let Some(disc_id) = reg.find_disconnected(&nick) {
        if reg.reconnect(disc_id, Instant::now()).is_err() {
            drop(reg);
            return ResolveOutcome::Closed;
        }
        let Some(room_id) = reg.get_player(disc_id).and_then(|p| p.room_id) else {
            drop(reg);
            return ResolveOutcome::Closed;
        };
        let Some(slot_idx) =
            reg.get_room(room_id).and_then(|r| r.slots.iter().position(|s| *s == Some(disc_id)))
        else {
            drop(reg);
            return ResolveOutcome::Closed;
        };
        reg.remove_player(provisional_id);
        drop(reg);
        info!(target: "lobby", %nick, room = %room_id, "player reconnecting");
        let _ = send_msg(&mut reader, &ServerMessage::GamePaused).await;
        if !resume_wait(reader, shared, disc_id, room_id, slot_idx).await {
            return ResolveOutcome::Closed;
        }
        return ResolveOutcome::Reconnected(room_id, slot_idx, disc_id);
    }

    reg.set_nickname(provisional_id, nick.clone());
    drop(reg);
    let _ = send_msg(&mut reader, &ServerMessage::ok_with("LOGIN", vec![("nick", nick)])).await;
    ResolveOutcome::Fresh(reader, provisional_id)
}

/// ResumeWait (spec.md §4.5.1 step 4). Consumes `reader`: on success it is
/// moved into the paused coordinator's mailbox and `true` is returned; on
/// any other outcome the room is aborted, the player removed, the reader
/// simply drops (closing the socket), and `false` is returned.
async fn resume_wait<S>(
    mut reader: LineReader<S>,
    shared: &Arc<SharedState<S>>,
    id: PlayerId,
    room_id: RoomId,
    slot_idx: usize,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = reader.receive_line(SOCKET_READ_TIMEOUT).await;
    let resumed = matches!(
        outcome,
        ReceiveOutcome::Line(ref l) if matches!(parse_command(l), Ok(ClientCommand::Resume))
    );

    if !resumed {
        warn!(target: "lobby", player = %id, "resume attempt failed, aborting room");
        let mut reg = shared.registry.lock().await;
        reg.set_room_state(room_id, RoomState::Aborted);
        reg.remove_player(id);
        drop(reg);
        shared.room_link(room_id).notify(RoomEvent::Aborted);
        return false;
    }

    {
        let mut reg = shared.registry.lock().await;
        reg.set_room_state(room_id, RoomState::InProgress);
    }

    // Ordering per SPEC_FULL.md §5: send our own OK before the coordinator
    // is told it may touch this socket again.
    let _ = send_msg(&mut reader, &ServerMessage::ok("RESUME")).await;

    let link = shared.room_link(room_id);
    link.deposit(slot_idx, reader).await;
    link.notify(RoomEvent::Reconnected);
    true
}

/// Park on a room's event channel until the coordinator signals the match
/// ended (or was aborted before properly starting), then reclaim the
/// socket the coordinator hands back at teardown. Returns `None` if there
/// is nothing to reclaim — this player's own socket was the one that
/// disconnected mid-game and was never spliced back in, so the connection
/// is already gone and the caller should simply end the task.
async fn park_until_game_ends<S>(
    shared: &Arc<SharedState<S>>,
    room_id: RoomId,
    slot_idx: usize,
    my_id: PlayerId,
) -> Option<LineReader<S>> {
    let link = shared.room_link(room_id);
    let mut events = link.subscribe();
    loop {
        tokio::select! {
            ev = events.recv() => {
                match ev {
                    Ok(RoomEvent::GameEnded) | Ok(RoomEvent::Aborted) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::time::sleep(PARK_POLL_INTERVAL) => {
                if shared.is_killed(my_id) {
                    break;
                }
            }
        }
    }
    link.take(slot_idx).await
}

/// The player's life from login (or reconnect handback) to EXIT/disconnect:
/// Lobby command dispatch, and — for as long as the player has joined a
/// room — the two InGameWait sub-phases (spec.md §4.5.1 steps 5-6) folded
/// into the same loop so the owned `reader` never needs to be threaded
/// through separate functions mid-game.
async fn play_lobby<S>(mut reader: LineReader<S>, shared: Arc<SharedState<S>>, id: PlayerId)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        if shared.is_killed(id) {
            let mut reg = shared.registry.lock().await;
            reg.remove_player(id);
            drop(reg);
            shared.forget(id);
            return;
        }

        let room_ctx = {
            let reg = shared.registry.lock().await;
            reg.get_player(id).and_then(|p| p.room_id).and_then(|room_id| {
                reg.get_room(room_id).map(|r| (room_id, r.state))
            })
        };

        let Some((room_id, room_state)) = room_ctx else {
            // Plain Lobby: no room joined.
            match reader.receive_line(IDLE_TIMEOUT / 2).await {
                ReceiveOutcome::Line(line) => {
                    touch(&shared, id).await;
                    if dispatch_lobby_command(&mut reader, &shared, id, &line).await {
                        return;
                    }
                }
                ReceiveOutcome::Timeout => {
                    if idle_timed_out(&shared, id).await {
                        let _ = send_msg(&mut reader, &ServerMessage::Disconnected).await;
                        remove_and_forget(&shared, id).await;
                        return;
                    }
                }
                ReceiveOutcome::Disconnect | ReceiveOutcome::Overflow | ReceiveOutcome::IoError(_) => {
                    remove_and_forget(&shared, id).await;
                    return;
                }
            }
            continue;
        };

        if matches!(room_state, RoomState::InProgress | RoomState::Paused) {
            let slot_idx = {
                let reg = shared.registry.lock().await;
                reg.get_room(room_id).and_then(|r| r.slots.iter().position(|s| *s == Some(id))).unwrap_or(0)
            };
            let link = shared.room_link(room_id);
            link.deposit(slot_idx, reader).await;
            match park_until_game_ends(&shared, room_id, slot_idx, id).await {
                Some(r) => reader = r,
                None => return,
            }
            continue;
        }

        // Waiting: joined a room that hasn't filled. Race our own socket
        // against the room filling up, still servicing LEAVE_ROOM/PING/EXIT.
        let link = shared.room_link(room_id);
        let mut events = link.subscribe();
        tokio::select! {
            outcome = reader.receive_line(PARK_POLL_INTERVAL) => {
                match outcome {
                    ReceiveOutcome::Line(line) => {
                        touch(&shared, id).await;
                        if dispatch_lobby_command(&mut reader, &shared, id, &line).await {
                            return;
                        }
                    }
                    ReceiveOutcome::Timeout => {
                        if idle_timed_out(&shared, id).await {
                            let _ = send_msg(&mut reader, &ServerMessage::Disconnected).await;
                            remove_and_forget(&shared, id).await;
                            return;
                        }
                    }
                    ReceiveOutcome::Disconnect | ReceiveOutcome::Overflow | ReceiveOutcome::IoError(_) => {
                        remove_and_forget(&shared, id).await;
                        return;
                    }
                }
            }
            _ = events.recv() => {}
        }
    }
}

async fn touch<S>(shared: &Arc<SharedState<S>>, id: PlayerId) {
    let mut reg = shared.registry.lock().await;
    reg.touch_activity(id, Instant::now());
}

async fn idle_timed_out<S>(shared: &Arc<SharedState<S>>, id: PlayerId) -> bool {
    let reg = shared.registry.lock().await;
    reg.get_player(id).map(|p| p.last_activity.elapsed() >= IDLE_TIMEOUT).unwrap_or(true)
}

async fn remove_and_forget<S>(shared: &Arc<SharedState<S>>, id: PlayerId) {
    let mut reg = shared.registry.lock().await;
    reg.remove_player(id);
    drop(reg);
    shared.forget(id);
}

/// Dispatch one Lobby/Waiting-phase command. Returns `true` if the
/// connection should close (EXIT, or any rejected malformed/unknown verb).
async fn dispatch_lobby_command<S>(
    reader: &mut LineReader<S>,
    shared: &Arc<SharedState<S>>,
    id: PlayerId,
    line: &str,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    match parse_command(line) {
        Ok(ClientCommand::ListRooms) => {
            let reg = shared.registry.lock().await;
            let rooms: Vec<_> =
                reg.list_rooms().iter().map(|r| (r.id.0, r.player_count, r.state.to_wire())).collect();
            drop(reg);
            for (room, count, state) in rooms {
                let _ = send_msg(reader, &ServerMessage::RoomInfo { room, count, state }).await;
            }
            false
        }
        Ok(ClientCommand::JoinRoom { room: Some(room) }) => {
            let room_id = RoomId(room);
            let mut reg = shared.registry.lock().await;
            match reg.join_room(room_id, id) {
                Ok(just_filled) => {
                    drop(reg);
                    let _ = send_msg(
                        reader,
                        &ServerMessage::ok_with("JOIN_ROOM", vec![("room", room.to_string())]),
                    )
                    .await;
                    let link = shared.room_link(room_id);
                    if just_filled {
                        spawn_game(Arc::clone(shared), room_id);
                    }
                    link.notify(RoomEvent::PlayerJoined);
                    false
                }
                Err(_) => {
                    drop(reg);
                    let _ =
                        send_msg(reader, &ServerMessage::error_for(ErrorKind::CannotJoin, "JOIN_ROOM")).await;
                    false
                }
            }
        }
        Ok(ClientCommand::JoinRoom { room: None }) => {
            let _ = send_msg(reader, &ServerMessage::error(ErrorKind::InvalidCommand)).await;
            false
        }
        Ok(ClientCommand::LeaveRoom) => {
            let mut reg = shared.registry.lock().await;
            match reg.leave_room(id) {
                Ok(()) => {
                    drop(reg);
                    let _ = send_msg(reader, &ServerMessage::ok("LEAVE_ROOM")).await;
                }
                Err(_) => {
                    drop(reg);
                    let _ = send_msg(reader, &ServerMessage::error(ErrorKind::GameInProgress)).await;
                }
            }
            false
        }
        Ok(ClientCommand::Ping) => {
            let _ = send_msg(reader, &ServerMessage::ok("PING")).await;
            false
        }
        Ok(ClientCommand::Exit) => {
            debug!(target: "lobby", player = %id, "player exiting");
            remove_and_forget(shared, id).await;
            true
        }
        _ => {
            let _ = send_msg(reader, &ServerMessage::error(ErrorKind::InvalidCommand)).await;
            remove_and_forget(shared, id).await;
            true
        }
    }
}
