use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::ProtocolError;

/// Heading of a snake. The discriminants are the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Down = 0,
    Left = 1,
    Up = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Left,
        Direction::Up,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        Self::ALL[(self as usize + 2) % 4]
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ProtocolError::InvalidDirection(value))
    }
}

/// A playfield cell. `(0, 0)` is the top-left cell inside the border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: u16,
    pub y: u16,
}

impl Cell {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step in `direction`, or `None` when that
    /// would underflow the coordinate space.
    pub fn step(self, direction: Direction) -> Option<Cell> {
        let (x, y) = (self.x, self.y);
        match direction {
            Direction::Down => y.checked_add(1).map(|y| Cell::new(x, y)),
            Direction::Left => x.checked_sub(1).map(|x| Cell::new(x, y)),
            Direction::Up => y.checked_sub(1).map(|y| Cell::new(x, y)),
            Direction::Right => x.checked_add(1).map(|x| Cell::new(x, y)),
        }
    }
}

/// One participant's snake.
///
/// Cells are ordered tail first: `cells[0]` is the tail and the back of the
/// deque is the head, so a move is a single pop/push pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub id: u8,
    /// Bound to a live network session (server bookkeeping)
    pub online: bool,
    pub live: bool,
    pub direction: Direction,
    pub last_direction: Direction,
    cells: VecDeque<Cell>,
}

impl Snake {
    /// Builds a live snake from tail-to-head cells.
    pub fn from_cells(id: u8, direction: Direction, cells: impl IntoIterator<Item = Cell>) -> Self {
        Self {
            id,
            online: false,
            live: true,
            direction,
            last_direction: direction,
            cells: cells.into_iter().collect(),
        }
    }

    /// A straight snake heading down, tail at `tail`, `length` cells long.
    pub fn vertical(id: u8, tail: Cell, length: u16) -> Self {
        let cells = (0..length).map(|i| Cell::new(tail.x, tail.y.saturating_add(i)));
        Self::from_cells(id, Direction::Down, cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn head(&self) -> Option<Cell> {
        self.cells.back().copied()
    }

    pub fn tail(&self) -> Option<Cell> {
        self.cells.front().copied()
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Moves one cell: drops the tail and appends `head`. Returns the vacated tail.
    pub fn advance(&mut self, head: Cell) -> Option<Cell> {
        let vacated = self.cells.pop_front();
        self.cells.push_back(head);
        vacated
    }

    /// Appends `head` while keeping the tail.
    pub fn grow(&mut self, head: Cell) {
        self.cells.push_back(head);
    }

    /// Empties the body, handing the cells back to the caller.
    pub(crate) fn take_cells(&mut self) -> Vec<Cell> {
        self.cells.drain(..).collect()
    }

    /// Applies the reversal guard: a heading opposite to the one applied on
    /// the previous tick is rejected. Returns whether the heading was taken.
    pub fn steer(&mut self, direction: Direction) -> bool {
        if direction == self.last_direction.opposite() {
            return false;
        }
        self.direction = direction;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_opposites() {
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn test_direction_wire_values() {
        assert_eq!(Direction::Down.as_u8(), 0);
        assert_eq!(Direction::Left.as_u8(), 1);
        assert_eq!(Direction::Up.as_u8(), 2);
        assert_eq!(Direction::Right.as_u8(), 3);
        assert_eq!(Direction::try_from(3).unwrap(), Direction::Right);
        assert!(matches!(
            Direction::try_from(4),
            Err(ProtocolError::InvalidDirection(4))
        ));
    }

    #[test]
    fn test_cell_step_underflow() {
        let origin = Cell::new(0, 0);
        assert_eq!(origin.step(Direction::Up), None);
        assert_eq!(origin.step(Direction::Left), None);
        assert_eq!(origin.step(Direction::Down), Some(Cell::new(0, 1)));
        assert_eq!(origin.step(Direction::Right), Some(Cell::new(1, 0)));
    }

    #[test]
    fn test_vertical_snake_layout() {
        let snake = Snake::vertical(3, Cell::new(5, 0), 20);
        assert_eq!(snake.len(), 20);
        assert_eq!(snake.tail(), Some(Cell::new(5, 0)));
        assert_eq!(snake.head(), Some(Cell::new(5, 19)));
        assert_eq!(snake.direction, Direction::Down);
        assert!(snake.live);
    }

    #[test]
    fn test_advance_is_a_shift() {
        let mut snake = Snake::vertical(0, Cell::new(2, 2), 3);
        let vacated = snake.advance(Cell::new(2, 5));

        assert_eq!(vacated, Some(Cell::new(2, 2)));
        assert_eq!(snake.len(), 3);
        let cells: Vec<Cell> = snake.cells().collect();
        assert_eq!(cells, vec![Cell::new(2, 3), Cell::new(2, 4), Cell::new(2, 5)]);
    }

    #[test]
    fn test_grow_keeps_tail() {
        let mut snake = Snake::vertical(0, Cell::new(2, 2), 3);
        snake.grow(Cell::new(2, 5));

        assert_eq!(snake.len(), 4);
        assert_eq!(snake.tail(), Some(Cell::new(2, 2)));
        assert_eq!(snake.head(), Some(Cell::new(2, 5)));
    }

    #[test]
    fn test_steer_rejects_reversal() {
        let mut snake = Snake::vertical(0, Cell::new(0, 0), 4);
        assert!(!snake.steer(Direction::Up));
        assert_eq!(snake.direction, Direction::Down);

        assert!(snake.steer(Direction::Left));
        assert_eq!(snake.direction, Direction::Left);

        // Still heading down on the last tick, so up stays forbidden
        assert!(!snake.steer(Direction::Up));
        assert_eq!(snake.direction, Direction::Left);
    }
}
