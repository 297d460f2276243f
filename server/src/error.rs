use shared::{GameError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be set up
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up the server world: {0}")]
    Game(#[from] GameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
