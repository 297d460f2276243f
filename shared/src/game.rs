use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};

use crate::arena::Arena;
use crate::board::Board;
use crate::display::{ColorClass, Surface, APPLE_GLYPH, SNAKE_GLYPH};
use crate::error::GameError;
use crate::input::accepts_turn;
use crate::protocol::{InitPacket, SnakeState};
use crate::snake::{Cell, Direction, Snake};
use crate::{BOARD_HEIGHT, BOARD_WIDTH, DEFAULT_SNAKE_LENGTH, MAX_SNAKES};

/// Something that happened during a tick that the network layer must report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// The locally controlled snake collided and has been released
    LocalLoss { id: u8 },
    /// A snake ate the apple and the authoritative side moved it
    AppleMoved { eaten_by: u8, apple: Cell },
}

/// The world as seen by one participant, plus the session settings that
/// drive its simulation.
pub struct GameState {
    pub board: Board,
    pub arena: Arena,
    apple: Cell,
    local_id: u8,
    /// Owns the apple: re-places it after it is eaten
    authoritative: bool,
    tick_delay: Duration,
    tick: u64,
    last_tick: Instant,
    rng: StdRng,
}

impl GameState {
    pub fn new(board: Board, local_id: u8, authoritative: bool, tick_delay: Duration) -> Self {
        Self {
            board,
            arena: Arena::new(MAX_SNAKES),
            apple: Cell::new(0, 0),
            local_id,
            authoritative,
            tick_delay,
            tick: 0,
            last_tick: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Server-side world: spawns the server's own snake (id 0) and the first
    /// apple.
    pub fn server(tick_delay: Duration) -> Result<Self, GameError> {
        let mut game = Self::new(Board::new(BOARD_WIDTH, BOARD_HEIGHT), 0, true, tick_delay);
        game.start_server()?;
        Ok(game)
    }

    /// Places the local snake and the apple on an empty authoritative world.
    pub fn start_server(&mut self) -> Result<(), GameError> {
        let id = self.spawn_snake()?;
        debug_assert_eq!(id, self.local_id);
        if let Some(apple) = self.board.place_apple(&self.arena, &mut self.rng) {
            self.apple = apple;
        }
        info!("Server snake {} spawned, apple at {:?}", id, self.apple);
        Ok(())
    }

    /// Client-side mirror built from the join handshake.
    pub fn client(init: &InitPacket) -> Result<Self, GameError> {
        if init.tick_delay_ms == 0 {
            return Err(GameError::ZeroTickDelay);
        }
        let tick_delay = Duration::from_millis(init.tick_delay_ms as u64);
        let mut game = Self::new(
            Board::new(BOARD_WIDTH, BOARD_HEIGHT),
            init.new_id,
            false,
            tick_delay,
        );
        game.apple = init.apple();
        game.arena.insert(Snake::vertical(
            init.new_id,
            init.start(),
            DEFAULT_SNAKE_LENGTH,
        ))?;
        Ok(game)
    }

    pub fn local_id(&self) -> u8 {
        self.local_id
    }

    pub fn apple(&self) -> Cell {
        self.apple
    }

    pub fn tick_delay(&self) -> Duration {
        self.tick_delay
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    pub fn local_snake(&self) -> Option<&Snake> {
        self.arena.get(self.local_id).filter(|snake| snake.live)
    }

    fn color_for(&self, id: u8) -> ColorClass {
        if id == self.local_id {
            ColorClass::Own
        } else {
            ColorClass::Opponent
        }
    }

    /// Redraws everything: border, every live snake and the apple.
    pub fn draw_board(&self, surface: &mut dyn Surface) {
        surface.draw_border(self.board.width, self.board.height);
        for id in self.arena.live_ids() {
            self.show_snake(id, surface);
        }
        self.show_apple(surface);
        surface.refresh();
    }

    pub fn show_snake(&self, id: u8, surface: &mut dyn Surface) {
        if let Some(snake) = self.arena.get(id).filter(|snake| snake.live) {
            let color = self.color_for(id);
            for cell in snake.cells() {
                surface.draw_cell(cell, SNAKE_GLYPH, color);
            }
        }
    }

    pub fn show_apple(&self, surface: &mut dyn Surface) {
        surface.draw_cell(self.apple, APPLE_GLYPH, ColorClass::Apple);
    }

    /// Allocates a slot and gives it a default snake in the first free column.
    ///
    /// On failure the slot is handed back, so a refused join leaves the arena
    /// as it was.
    pub fn spawn_snake(&mut self) -> Result<u8, GameError> {
        let id = self.arena.allocate()?;
        let Some(tail) = self.board.find_spawn(&self.arena, DEFAULT_SNAKE_LENGTH) else {
            self.arena.disconnect(id);
            return Err(GameError::NoSpawnColumn {
                length: DEFAULT_SNAKE_LENGTH,
            });
        };
        self.arena
            .insert(Snake::vertical(id, tail, DEFAULT_SNAKE_LENGTH))?;
        Ok(id)
    }

    /// Adds a snake announced by the server (mirror side).
    pub fn insert_snake(&mut self, snake: Snake) -> Result<(), GameError> {
        self.arena.insert(snake)?;
        Ok(())
    }

    pub fn set_direction(&mut self, id: u8, direction: Direction) -> bool {
        self.arena.set_direction(id, direction)
    }

    /// Applies a local turn request. Rejected turns leave the snake untouched.
    pub fn steer_local(&mut self, direction: Direction) -> bool {
        let accepted = self
            .local_snake()
            .map_or(false, |snake| accepts_turn(snake.last_direction, direction));
        accepted && self.arena.set_direction(self.local_id, direction)
    }

    /// Kills a snake and erases it. Returns false if it was already dead.
    pub fn release(&mut self, id: u8, surface: &mut dyn Surface) -> bool {
        match self.arena.release(id) {
            Some(cells) => {
                for cell in cells {
                    surface.erase_cell(cell);
                }
                true
            }
            None => false,
        }
    }

    /// Unbinds a slot from its session and erases whatever was left of it.
    pub fn disconnect(&mut self, id: u8, surface: &mut dyn Surface) {
        if let Some(cells) = self.arena.disconnect(id) {
            for cell in cells {
                surface.erase_cell(cell);
            }
        }
    }

    pub fn set_apple(&mut self, apple: Cell, surface: &mut dyn Surface) {
        self.apple = apple;
        self.show_apple(surface);
    }

    fn relocate_apple(&mut self, surface: &mut dyn Surface) -> Option<Cell> {
        match self.board.place_apple(&self.arena, &mut self.rng) {
            Some(apple) => {
                self.set_apple(apple, surface);
                Some(apple)
            }
            None => {
                warn!("Could not place a new apple, keeping {:?}", self.apple);
                None
            }
        }
    }

    /// Time since the last tick boundary, capped at one tick, in milliseconds.
    pub fn sync_offset(&self) -> u16 {
        self.last_tick
            .elapsed()
            .min(self.tick_delay)
            .as_millis()
            .min(u16::MAX as u128) as u16
    }

    /// Bulk state for a joining client: every live snake except its own.
    pub fn snapshot_for(&self, id: u8) -> Vec<SnakeState> {
        self.arena
            .live()
            .filter(|snake| snake.id != id)
            .map(SnakeState::from_snake)
            .collect()
    }

    /// Handshake header for the freshly spawned snake `id`.
    pub fn init_packet_for(&self, id: u8) -> Option<InitPacket> {
        let start = self.arena.get(id)?.tail()?;
        let alive_count = self.arena.live().filter(|snake| snake.id != id).count();
        Some(InitPacket {
            new_id: id,
            alive_count: alive_count.min(u8::MAX as usize) as u8,
            start_x: start.x,
            start_y: start.y,
            apple_x: self.apple.x,
            apple_y: self.apple.y,
            tick_delay_ms: self.tick_delay.as_millis().min(u16::MAX as u128) as u16,
            sync_offset_ms: self.sync_offset(),
        })
    }

    /// Advances every live snake by one cell.
    ///
    /// Only the local snake is collision-checked; peers report their own
    /// deaths. A peer's snake that would leave the playfield holds still
    /// until that report arrives.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Vec<TickEvent> {
        let mut events = Vec::new();

        for id in self.arena.live_ids() {
            let Some(snake) = self.arena.get_mut(id).filter(|snake| snake.live) else {
                continue;
            };
            let Some(head) = snake.head() else {
                continue;
            };
            snake.last_direction = snake.direction;
            let next = self.board.step(head, snake.direction);

            if id == self.local_id {
                let blocked = match next {
                    Some(cell) => self.board.occupied(&self.arena, cell),
                    None => true,
                };
                if blocked {
                    debug!("Local snake {} crashed moving from {:?}", id, head);
                    self.release(id, surface);
                    events.push(TickEvent::LocalLoss { id });
                    continue;
                }
            }

            let Some(next) = next else {
                continue;
            };
            let color = self.color_for(id);
            let Some(snake) = self.arena.get_mut(id) else {
                continue;
            };

            if next == self.apple {
                snake.grow(next);
                if self.authoritative {
                    if let Some(apple) = self.relocate_apple(surface) {
                        events.push(TickEvent::AppleMoved { eaten_by: id, apple });
                    }
                }
            } else if let Some(vacated) = snake.advance(next) {
                surface.erase_cell(vacated);
            }
            surface.draw_cell(next, SNAKE_GLYPH, color);
        }

        surface.refresh();
        self.tick += 1;
        self.last_tick = Instant::now();
        events
    }
}
