//! Terminal display surface
//!
//! Draws the playfield with crossterm. Cell `(x, y)` lands on screen column
//! `x + 1`, row `y + 1`, leaving room for the border.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use shared::{Cell, ColorClass, Surface};
use std::io::{self, Stdout, Write};

pub struct TerminalSurface {
    out: Stdout,
    /// Whether we're in alternate screen mode
    alternate_screen: bool,
    raw_mode: bool,
}

impl TerminalSurface {
    /// Switches the terminal to a raw, cursorless alternate screen.
    pub fn open() -> io::Result<Self> {
        let mut surface = Self {
            out: io::stdout(),
            alternate_screen: false,
            raw_mode: false,
        };

        execute!(surface.out, EnterAlternateScreen)?;
        surface.alternate_screen = true;
        execute!(surface.out, Hide, Clear(ClearType::All))?;
        terminal::enable_raw_mode()?;
        surface.raw_mode = true;

        Ok(surface)
    }

    /// Restores the terminal to the state it was in before `open`
    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
            self.raw_mode = false;
        }
        if self.alternate_screen {
            execute!(self.out, ResetColor, Show, LeaveAlternateScreen)?;
            self.alternate_screen = false;
        }
        Ok(())
    }

    fn color(class: ColorClass) -> Color {
        match class {
            ColorClass::Own => Color::Red,
            ColorClass::Opponent => Color::Blue,
            ColorClass::Apple => Color::Green,
        }
    }

    fn put(&mut self, column: u16, row: u16, glyph: char) -> io::Result<()> {
        queue!(self.out, MoveTo(column, row), Print(glyph))
    }

    fn put_cell(&mut self, cell: Cell, glyph: char, color: Option<Color>) -> io::Result<()> {
        let (column, row) = (cell.x.saturating_add(1), cell.y.saturating_add(1));
        match color {
            Some(color) => queue!(
                self.out,
                MoveTo(column, row),
                SetForegroundColor(color),
                Print(glyph),
                ResetColor
            ),
            None => self.put(column, row, glyph),
        }
    }

    fn border(&mut self, width: u16, height: u16) -> io::Result<()> {
        let right = width.saturating_add(1);
        let bottom = height.saturating_add(1);

        for column in 0..=right {
            let glyph = if column == 0 || column == right { '+' } else { '-' };
            self.put(column, 0, glyph)?;
            self.put(column, bottom, glyph)?;
        }
        for row in 1..bottom {
            self.put(0, row, '|')?;
            self.put(right, row, '|')?;
        }
        Ok(())
    }
}

impl Surface for TerminalSurface {
    fn draw_cell(&mut self, cell: Cell, glyph: char, color: ColorClass) {
        if let Err(e) = self.put_cell(cell, glyph, Some(Self::color(color))) {
            debug!("Failed to draw {:?}: {}", cell, e);
        }
    }

    fn erase_cell(&mut self, cell: Cell) {
        if let Err(e) = self.put_cell(cell, ' ', None) {
            debug!("Failed to erase {:?}: {}", cell, e);
        }
    }

    fn draw_border(&mut self, width: u16, height: u16) {
        if let Err(e) = self.border(width, height) {
            debug!("Failed to draw border: {}", e);
        }
    }

    fn refresh(&mut self) {
        if let Err(e) = self.out.flush() {
            debug!("Failed to flush terminal: {}", e);
        }
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
