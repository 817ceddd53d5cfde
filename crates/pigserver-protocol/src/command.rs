//! Client → server command parsing.
//!
//! A line is `VERB[|key:value]*`. This module only splits and validates
//! shape; it does not know whether a verb is legal in the caller's current
//! state (that's the connection handler's / coordinator's job).

use crate::constants::MAX_ARGS;
use crate::error::ProtocolError;

/// A parsed, typed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Login { nick: String },
    Resume,
    ListRooms,
    JoinRoom { room: Option<u32> },
    LeaveRoom,
    Roll,
    Hold,
    Quit,
    Ping,
    Exit,
    GameStateRequest,
    /// Recognized shape, unrecognized verb.
    Unknown,
}

impl ClientCommand {
    /// The verb token as emitted by the client, used for `ERROR|cmd:...` /
    /// `OK|cmd:...` echo fields.
    pub fn verb_str(&self) -> &'static str {
        match self {
            ClientCommand::Login { .. } => "LOGIN",
            ClientCommand::Resume => "RESUME",
            ClientCommand::ListRooms => "LIST_ROOMS",
            ClientCommand::JoinRoom { .. } => "JOIN_ROOM",
            ClientCommand::LeaveRoom => "LEAVE_ROOM",
            ClientCommand::Roll => "ROLL",
            ClientCommand::Hold => "HOLD",
            ClientCommand::Quit => "QUIT",
            ClientCommand::Ping => "PING",
            ClientCommand::Exit => "EXIT",
            ClientCommand::GameStateRequest => "GAME_STATE_REQUEST",
            ClientCommand::Unknown => "UNKNOWN",
        }
    }
}

/// A line split into a verb and its key:value pairs, before the verb has
/// been matched against the recognized set. Exposed for callers that want
/// the raw argument lookup (e.g. to reject a `JOIN_ROOM` with a missing
/// `room` key as `INVALID_COMMAND` rather than silently defaulting).
pub struct RawCommand {
    pub verb: String,
    args: Vec<(String, String)>,
}

impl RawCommand {
    pub fn arg(&self, key: &str) -> Option<&str> {
        // Duplicate keys: last one wins, so scan in order and keep overwriting.
        self.args.iter().filter(|(k, _)| k == key).last().map(|(_, v)| v.as_str())
    }
}

/// Split one line (without its trailing `\n`/`\r`) into a [`RawCommand`].
pub fn parse_raw(line: &str) -> Result<RawCommand, ProtocolError> {
    let mut parts = line.split('|');
    let verb = parts.next().filter(|v| !v.is_empty()).ok_or(ProtocolError::EmptyLine)?;

    let mut args = Vec::new();
    for token in parts {
        if args.len() >= MAX_ARGS {
            return Err(ProtocolError::TooManyArgs);
        }
        let (key, value) = token
            .split_once(':')
            .ok_or_else(|| ProtocolError::MissingColon(token.to_string()))?;
        args.push((key.to_string(), value.to_string()));
    }

    Ok(RawCommand { verb: verb.to_string(), args })
}

/// Parse a line directly into a [`ClientCommand`]. Malformed shape (no verb,
/// missing `:`, too many args) surfaces as `Err`; an unrecognized verb is
/// not an error — it comes back as [`ClientCommand::Unknown`], matching
/// spec.md's "unknown verbs produce the tagged value Unknown".
pub fn parse_command(line: &str) -> Result<ClientCommand, ProtocolError> {
    let raw = parse_raw(line)?;
    let cmd = match raw.verb.as_str() {
        "LOGIN" => ClientCommand::Login { nick: raw.arg("nick").unwrap_or("").to_string() },
        "RESUME" => ClientCommand::Resume,
        "LIST_ROOMS" => ClientCommand::ListRooms,
        "JOIN_ROOM" => ClientCommand::JoinRoom { room: raw.arg("room").and_then(|v| v.parse().ok()) },
        "LEAVE_ROOM" => ClientCommand::LeaveRoom,
        "ROLL" => ClientCommand::Roll,
        "HOLD" => ClientCommand::Hold,
        "QUIT" => ClientCommand::Quit,
        "PING" => ClientCommand::Ping,
        "EXIT" => ClientCommand::Exit,
        "GAME_STATE_REQUEST" => ClientCommand::GameStateRequest,
        _ => ClientCommand::Unknown,
    };
    Ok(cmd)
}
