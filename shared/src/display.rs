//! Drawing capability the simulation renders through
//!
//! The game only knows cells, glyphs and color classes. Putting characters
//! on an actual screen is the job of whatever implements [`Surface`].

use crate::snake::Cell;

pub const SNAKE_GLYPH: char = '#';
pub const APPLE_GLYPH: char = '%';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    /// The locally controlled snake
    Own,
    Opponent,
    Apple,
}

pub trait Surface: Send {
    fn draw_cell(&mut self, cell: Cell, glyph: char, color: ColorClass);
    fn erase_cell(&mut self, cell: Cell);
    /// Draws the frame around a `width` × `height` playfield.
    fn draw_border(&mut self, width: u16, height: u16);
    fn refresh(&mut self);
}

/// Discards everything. Used for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn draw_cell(&mut self, _cell: Cell, _glyph: char, _color: ColorClass) {}
    fn erase_cell(&mut self, _cell: Cell) {}
    fn draw_border(&mut self, _width: u16, _height: u16) {}
    fn refresh(&mut self) {}
}

/// Remembers every call, for assertions in tests
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOp {
    Draw(Cell, char, ColorClass),
    Erase(Cell),
    Border(u16, u16),
    Refresh,
}

impl RecordingSurface {
    pub fn drawn(&self) -> impl Iterator<Item = (Cell, ColorClass)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Draw(cell, _, color) => Some((*cell, *color)),
            _ => None,
        })
    }

    pub fn erased(&self) -> impl Iterator<Item = Cell> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Erase(cell) => Some(*cell),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Surface for RecordingSurface {
    fn draw_cell(&mut self, cell: Cell, glyph: char, color: ColorClass) {
        self.ops.push(DrawOp::Draw(cell, glyph, color));
    }

    fn erase_cell(&mut self, cell: Cell) {
        self.ops.push(DrawOp::Erase(cell));
    }

    fn draw_border(&mut self, width: u16, height: u16) {
        self.ops.push(DrawOp::Border(width, height));
    }

    fn refresh(&mut self) {
        self.ops.push(DrawOp::Refresh);
    }
}
