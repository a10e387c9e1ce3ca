use thiserror::Error;

/// Everything that can go wrong between handing a command to the
/// dispatcher and getting a decoded response back.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("serial link error: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error("device stayed busy past the {0:?} budget")]
    BusyTimeout(std::time::Duration),
    #[error("no response received")]
    NoResponse,
    #[error("device rejected the command as invalid")]
    InvalidCommand,
    #[error("device cannot execute the command")]
    CannotExecute,
    #[error("response opcode '{got}' does not match request '{sent}'")]
    Desync { sent: char, got: char },
    #[error("malformed response line: {0:?}")]
    MalformedResponse(String),
}

impl From<std::io::Error> for ProtoError {
    fn from(e: std::io::Error) -> Self {
        ProtoError::Connection(e.to_string())
    }
}
