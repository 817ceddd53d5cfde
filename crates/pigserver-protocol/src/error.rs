use thiserror::Error;

/// Failures from encoding a server message or parsing a client line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("encoded message exceeds MSG_MAX_LEN ({len} > {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("command line has no verb")]
    EmptyLine,

    #[error("argument {0:?} is missing a ':' separator")]
    MissingColon(String),

    #[error("command has more than MAX_ARGS arguments")]
    TooManyArgs,
}
