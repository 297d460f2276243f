use shared::{GameError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The server could not be reached
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server answered the join with a refusal
    #[error("server refused the connection: arena is full")]
    Refused,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid session state: {0}")]
    Game(#[from] GameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
