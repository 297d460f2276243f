//! Error types shared by both roles

use thiserror::Error;

/// Failures while reading or writing wire messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream cleanly before the first byte of a message
    #[error("connection closed by peer")]
    Closed,

    /// The stream ended in the middle of a message
    #[error("truncated {kind} message")]
    Truncated { kind: &'static str },

    #[error("unknown magic byte {0}")]
    UnknownMagic(u8),

    #[error("invalid direction byte {0}")]
    InvalidDirection(u8),

    #[error("message body encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when the peer simply went away, as opposed to sending garbage
    pub fn is_closed(&self) -> bool {
        matches!(self, ProtocolError::Closed)
    }
}

/// Failures of the snake slot table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("no free snake slot (capacity {capacity})")]
    Full { capacity: usize },

    #[error("snake id {0} is outside the arena")]
    OutOfRange(u8),
}

/// Failures of world-level operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// Every candidate spawn column is blocked
    #[error("no free column to spawn a snake of length {length}")]
    NoSpawnColumn { length: u16 },

    #[error("tick delay must be at least one millisecond")]
    ZeroTickDelay,
}
