//! # Snake Arena shared crate
//!
//! Everything both roles agree on: the world model, the rules that move it
//! forward, and the bytes that travel between server and clients.
//!
//! ## Module Organization
//!
//! - `snake`: cells, directions and a single snake's body
//! - `arena`: the fixed-capacity slot table of snakes, indexed by id
//! - `board`: playfield geometry, occupancy, apple placement and spawning
//! - `game`: the per-participant world plus the tick engine
//! - `protocol`: the packed big-endian wire format
//! - `display`: the drawing capability the game renders through
//! - `input`: key to direction translation and the reversal guard
//! - `config`: startup settings
//! - `error`: error types for all of the above

pub mod arena;
pub mod board;
pub mod config;
pub mod display;
pub mod error;
pub mod game;
pub mod input;
pub mod protocol;
pub mod snake;

pub use arena::Arena;
pub use board::Board;
pub use config::{Config, Role};
pub use display::{ColorClass, NullSurface, Surface};
pub use error::{ArenaError, GameError, ProtocolError};
pub use game::{GameState, TickEvent};
pub use input::{Key, LocalCommand};
pub use protocol::{ClientPacket, InitPacket, ServerPacket, SnakeState};
pub use snake::{Cell, Direction, Snake};

/// Playfield size in cells, border excluded
pub const BOARD_WIDTH: u16 = 98;
pub const BOARD_HEIGHT: u16 = 38;

/// Slot table capacity; id 0 is always the server's own snake
pub const MAX_SNAKES: usize = 100;

pub const DEFAULT_SNAKE_LENGTH: u16 = 20;

/// First column tried when spawning a snake
pub const SPAWN_COLUMN: u16 = 5;

/// Random apple draws before falling back to a scan of free cells
pub const MAX_APPLE_ATTEMPTS: usize = 1024;
