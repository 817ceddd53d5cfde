//! Server → client message shapes and the line encoder.
//!
//! Every message is `VERB[|key:value]*\n`. Encoding never escapes a value —
//! callers are responsible for only ever putting wire-safe tokens (nicknames,
//! decimal numbers, fixed enum strings) into a message; none of this
//! protocol's own values can contain `|`, `:`, or a line break.

use crate::constants::MSG_MAX_LEN;
use crate::error::ProtocolError;

/// The `msg` value of an `ERROR` response. Variant names are the exact wire
/// tokens (`Display` renders them verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCommand,
    InvalidNickname,
    NicknameInUse,
    ServerFull,
    RoomFull,
    GameInProgress,
    CannotJoin,
    OpponentQuit,
    OpponentTimeout,
}

impl ErrorKind {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidCommand => "INVALID_COMMAND",
            ErrorKind::InvalidNickname => "INVALID_NICKNAME",
            ErrorKind::NicknameInUse => "NICKNAME_IN_USE",
            ErrorKind::ServerFull => "SERVER_FULL",
            ErrorKind::RoomFull => "ROOM_FULL",
            ErrorKind::GameInProgress => "GAME_IN_PROGRESS",
            ErrorKind::CannotJoin => "CANNOT_JOIN",
            ErrorKind::OpponentQuit => "OPPONENT_QUIT",
            ErrorKind::OpponentTimeout => "OPPONENT_TIMEOUT",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// Wire string for a room's state, used in `ROOM_INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStateWire {
    Waiting,
    InProgress,
    Paused,
    Aborted,
}

impl RoomStateWire {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            RoomStateWire::Waiting => "WAITING",
            RoomStateWire::InProgress => "IN_PROGRESS",
            RoomStateWire::Paused => "PAUSED",
            RoomStateWire::Aborted => "ABORTED",
        }
    }
}

/// A fully-specified server → client message, independent of any one
/// connection. [`ServerMessage::encode`] renders it to a wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome { max_players: usize, max_rooms: usize },
    Ok { cmd: &'static str, extra: Vec<(&'static str, String)> },
    Error { msg: ErrorKind, cmd: Option<&'static str> },
    GamePaused,
    RoomInfo { room: u32, count: usize, state: RoomStateWire },
    GameStart { opp_nick: String, your_turn: bool },
    GameState { my_score: u32, opp_score: u32, turn_score: u32, roll: u32, your_turn: bool },
    GameWin { msg: Option<String> },
    GameLose,
    OpponentDisconnected,
    OpponentReconnected,
    Disconnected,
}

impl ServerMessage {
    pub fn ok(cmd: &'static str) -> Self {
        ServerMessage::Ok { cmd, extra: Vec::new() }
    }

    pub fn ok_with(cmd: &'static str, extra: Vec<(&'static str, String)>) -> Self {
        ServerMessage::Ok { cmd, extra }
    }

    pub fn error(msg: ErrorKind) -> Self {
        ServerMessage::Error { msg, cmd: None }
    }

    pub fn error_for(msg: ErrorKind, cmd: &'static str) -> Self {
        ServerMessage::Error { msg, cmd: Some(cmd) }
    }

    /// Render to the exact `VERB|k:v|k:v\n` wire form.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut out = String::with_capacity(64);
        match self {
            ServerMessage::Welcome { max_players, max_rooms } => {
                out.push_str("WELCOME");
                push_kv(&mut out, "players", max_players);
                push_kv(&mut out, "rooms", max_rooms);
            }
            ServerMessage::Ok { cmd, extra } => {
                out.push_str("OK");
                push_kv(&mut out, "cmd", cmd);
                for (k, v) in extra {
                    push_kv(&mut out, k, v);
                }
            }
            ServerMessage::Error { msg, cmd } => {
                out.push_str("ERROR");
                push_kv(&mut out, "msg", msg.as_wire_str());
                if let Some(cmd) = cmd {
                    push_kv(&mut out, "cmd", cmd);
                }
            }
            ServerMessage::GamePaused => out.push_str("GAME_PAUSED"),
            ServerMessage::RoomInfo { room, count, state } => {
                out.push_str("ROOM_INFO");
                push_kv(&mut out, "room", room);
                push_kv(&mut out, "count", count);
                push_kv(&mut out, "state", state.as_wire_str());
            }
            ServerMessage::GameStart { opp_nick, your_turn } => {
                out.push_str("GAME_START");
                push_kv(&mut out, "opp_nick", opp_nick);
                push_kv(&mut out, "your_turn", bool_str(*your_turn));
            }
            ServerMessage::GameState { my_score, opp_score, turn_score, roll, your_turn } => {
                out.push_str("GAME_STATE");
                push_kv(&mut out, "my_score", my_score);
                push_kv(&mut out, "opp_score", opp_score);
                push_kv(&mut out, "turn_score", turn_score);
                push_kv(&mut out, "roll", roll);
                push_kv(&mut out, "your_turn", bool_str(*your_turn));
            }
            ServerMessage::GameWin { msg } => {
                out.push_str("GAME_WIN");
                if let Some(msg) = msg {
                    push_kv(&mut out, "msg", msg);
                }
            }
            ServerMessage::GameLose => out.push_str("GAME_LOSE"),
            ServerMessage::OpponentDisconnected => out.push_str("OPPONENT_DISCONNECTED"),
            ServerMessage::OpponentReconnected => out.push_str("OPPONENT_RECONNECTED"),
            ServerMessage::Disconnected => out.push_str("DISCONNECTED"),
        }
        out.push('\n');

        if out.len() > MSG_MAX_LEN {
            return Err(ProtocolError::MessageTooLong { len: out.len(), max: MSG_MAX_LEN });
        }
        Ok(out)
    }
}

fn push_kv(out: &mut String, key: &str, value: impl std::fmt::Display) {
    out.push('|');
    out.push_str(key);
    out.push(':');
    use std::fmt::Write;
    let _ = write!(out, "{value}");
}

fn bool_str(b: bool) -> &'static str {
    if b { "1" } else { "0" }
}
