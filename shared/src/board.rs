//! Playfield geometry and occupancy rules

use log::warn;
use rand::Rng;

use crate::arena::Arena;
use crate::snake::{Cell, Direction};
use crate::{MAX_APPLE_ATTEMPTS, SPAWN_COLUMN};

/// The open playfield inside the border
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub width: u16,
    pub height: u16,
}

impl Board {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The next cell in `direction`, or `None` if it leaves the playfield.
    pub fn step(&self, from: Cell, direction: Direction) -> Option<Cell> {
        from.step(direction).filter(|cell| self.contains(*cell))
    }

    /// True if any live snake has a segment on `cell`.
    pub fn occupied(&self, arena: &Arena, cell: Cell) -> bool {
        arena.live().any(|snake| snake.contains(cell))
    }

    /// Picks a free cell for the apple.
    ///
    /// Samples uniformly at random first. After `MAX_APPLE_ATTEMPTS` misses it
    /// falls back to choosing among every free cell, so a crowded board still
    /// terminates. Returns `None` only when no cell is free.
    pub fn place_apple<R: Rng + ?Sized>(&self, arena: &Arena, rng: &mut R) -> Option<Cell> {
        if self.cell_count() == 0 {
            return None;
        }

        for _ in 0..MAX_APPLE_ATTEMPTS {
            let cell = Cell::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height));
            if !self.occupied(arena, cell) {
                return Some(cell);
            }
        }

        let free = self.free_cells(arena);
        if free.is_empty() {
            warn!("Board is saturated, no cell left for the apple");
            return None;
        }
        Some(free[rng.gen_range(0..free.len())])
    }

    /// Every cell not covered by a live snake, row by row.
    pub fn free_cells(&self, arena: &Arena) -> Vec<Cell> {
        let mut taken = vec![false; self.cell_count()];
        for snake in arena.live() {
            for cell in snake.cells().filter(|cell| self.contains(*cell)) {
                taken[cell.y as usize * self.width as usize + cell.x as usize] = true;
            }
        }

        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Cell::new(x, y)))
            .filter(|cell| !taken[cell.y as usize * self.width as usize + cell.x as usize])
            .collect()
    }

    /// Finds the tail cell for a new vertical snake of `length` cells.
    ///
    /// Columns are scanned left to right starting at `SPAWN_COLUMN`; the first
    /// column whose top `length` rows are all free wins.
    pub fn find_spawn(&self, arena: &Arena, length: u16) -> Option<Cell> {
        if length == 0 || length > self.height {
            return None;
        }

        (SPAWN_COLUMN..self.width)
            .find(|&x| (0..length).all(|y| !self.occupied(arena, Cell::new(x, y))))
            .map(|x| Cell::new(x, 0))
    }
}
