//! Fixed-capacity snake table keyed by small integer ids
//!
//! Ids are stable: a snake never moves between slots. Killing a snake only
//! clears its liveness, and a slot becomes reusable once it is no longer bound
//! to a network session. Free slots are kept in an ordered set so allocation
//! always hands out the lowest free id.

use std::collections::BTreeSet;

use crate::error::ArenaError;
use crate::snake::{Cell, Direction, Snake};

#[derive(Debug, Clone)]
pub struct Arena {
    slots: Vec<Option<Snake>>,
    free: BTreeSet<u8>,
}

impl Arena {
    /// Creates an arena with `capacity` slots. Capacity is capped at 256 so
    /// every id fits in a byte.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        Self {
            slots: vec![None; capacity],
            free: (0..capacity).map(|id| id as u8).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserves the lowest free slot and marks it online.
    ///
    /// The slot holds a dead, empty snake until [`Arena::insert`] places a
    /// body in it.
    pub fn allocate(&mut self) -> Result<u8, ArenaError> {
        let id = self.free.pop_first().ok_or(ArenaError::Full {
            capacity: self.capacity(),
        })?;
        let mut snake = Snake::from_cells(id, Direction::Down, std::iter::empty());
        snake.live = false;
        snake.online = true;
        self.slots[id as usize] = Some(snake);
        Ok(id)
    }

    /// Puts `snake` into the slot named by its id, replacing whatever was
    /// there. The `online` flag of an existing occupant is carried over.
    pub fn insert(&mut self, mut snake: Snake) -> Result<(), ArenaError> {
        let id = snake.id;
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(ArenaError::OutOfRange(id))?;
        if let Some(previous) = slot.as_ref() {
            snake.online |= previous.online;
        }
        *slot = Some(snake);
        self.free.remove(&id);
        Ok(())
    }

    pub fn get(&self, id: u8) -> Option<&Snake> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Snake> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Steers a live snake, subject to the reversal guard.
    pub fn set_direction(&mut self, id: u8, direction: Direction) -> bool {
        match self.get_mut(id) {
            Some(snake) if snake.live => snake.steer(direction),
            _ => false,
        }
    }

    /// Kills a snake and returns the cells it occupied.
    ///
    /// Releasing a dead or empty slot is a no-op returning `None`. A slot that
    /// is not bound to a session goes straight back to the free list.
    pub fn release(&mut self, id: u8) -> Option<Vec<Cell>> {
        let slot = self.slots.get_mut(id as usize)?;
        let snake = slot.as_mut()?;
        if !snake.live {
            return None;
        }
        snake.live = false;
        let cells = snake.take_cells();
        if !snake.online {
            *slot = None;
            self.free.insert(id);
        }
        Some(cells)
    }

    /// Unbinds a slot from its session, releasing the snake if it is still
    /// alive. Returns the cells vacated by that release, if any.
    pub fn disconnect(&mut self, id: u8) -> Option<Vec<Cell>> {
        let slot = self.slots.get_mut(id as usize)?;
        let snake = slot.as_mut()?;
        snake.online = false;
        let cells = if snake.live {
            snake.live = false;
            Some(snake.take_cells())
        } else {
            None
        };
        *slot = None;
        self.free.insert(id);
        cells
    }

    pub fn is_free(&self, id: u8) -> bool {
        self.free.contains(&id)
    }

    pub fn live(&self) -> impl Iterator<Item = &Snake> {
        self.slots.iter().flatten().filter(|snake| snake.live)
    }

    pub fn live_ids(&self) -> Vec<u8> {
        self.live().map(|snake| snake.id).collect()
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }
}
