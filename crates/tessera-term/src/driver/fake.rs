// SPDX-License-Identifier: MIT
//
// In-memory console.
//
// Behaves like a console with a screen buffer of fixed size: writes land in
// a cell grid at the requested window, the cursor has a position and a
// visibility, and input comes from a queue the test fills. Tests drive the
// real `CursorTracker` through it; `refuse_cursor` makes the console reject
// visibility changes so the pending path can be exercised.

use std::collections::VecDeque;

use tracing::trace;

use super::ConsoleDriver;
use crate::buffer::Rect;
use crate::cell::Cell;
use crate::cursor::{CursorBackend, CursorTracker, CursorVisibility};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::terminal::Size;

/// The emulated console's cursor hardware.
#[derive(Debug, Clone)]
struct FakeCursor {
    shown: CursorVisibility,
    refuse: bool,
    applies: usize,
}

impl CursorBackend for FakeCursor {
    fn can_apply(&self) -> bool {
        !self.refuse
    }

    fn query(&mut self) -> Option<CursorVisibility> {
        Some(self.shown)
    }

    fn apply(&mut self, vis: CursorVisibility) -> Result<()> {
        if self.refuse {
            return Err(Error::Unsupported("cursor changes refused"));
        }
        self.shown = vis;
        self.applies += 1;
        Ok(())
    }
}

/// Test console.
///
/// ```
/// use tessera_term::buffer::ScreenBuffer;
/// use tessera_term::driver::{ConsoleDriver, FakeDriver};
///
/// let mut console = FakeDriver::new(10, 2);
/// let mut buf = ScreenBuffer::new(10, 2);
/// buf.add_str("hello");
/// console.update_screen(&mut buf).unwrap();
/// assert_eq!(console.row_text(0), "hello     ");
/// ```
#[derive(Debug)]
pub struct FakeDriver {
    size: Size,
    screen: Vec<Cell>,
    force_16_colors: bool,
    last_frame_16_colors: bool,
    writes: usize,
    position: (u16, u16),
    hw_cursor: FakeCursor,
    cursor: CursorTracker,
    input: VecDeque<Event>,
}

impl FakeDriver {
    /// Blank console of `cols × rows` with a default cursor.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        let size = Size { cols, rows };
        Self {
            size,
            screen: vec![Cell::BLANK; size.area() as usize],
            force_16_colors: false,
            last_frame_16_colors: false,
            writes: 0,
            position: (0, 0),
            hw_cursor: FakeCursor {
                shown: CursorVisibility::Default,
                refuse: false,
                applies: 0,
            },
            cursor: CursorTracker::new(),
            input: VecDeque::new(),
        }
    }

    /// Limit frames from `update_screen` to the 16 named colors.
    pub fn set_force_16_colors(&mut self, on: bool) {
        self.force_16_colors = on;
    }

    /// Queue an input event.
    pub fn push_input(&mut self, event: Event) {
        self.input.push_back(event);
    }

    /// Change the console size: the screen is blanked and a resize event
    /// queued, as a real console would.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.size = Size { cols, rows };
        self.screen = vec![Cell::BLANK; self.size.area() as usize];
        self.input.push_back(Event::Resize(self.size));
    }

    /// Make the console reject (or accept again) cursor changes.
    pub fn refuse_cursor(&mut self, refuse: bool) {
        self.hw_cursor.refuse = refuse;
    }

    /// What the cursor hardware shows right now.
    #[must_use]
    pub fn shown_cursor(&self) -> CursorVisibility {
        self.hw_cursor.shown
    }

    /// How many times the cursor hardware was changed.
    #[must_use]
    pub fn cursor_applies(&self) -> usize {
        self.hw_cursor.applies
    }

    /// Cursor position set by the last `set_cursor_position`.
    #[must_use]
    pub const fn cursor_position(&self) -> (u16, u16) {
        self.position
    }

    /// Number of `write_to_console` calls that wrote something.
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }

    /// Whether the last frame was 16-color.
    #[must_use]
    pub const fn last_frame_16_colors(&self) -> bool {
        self.last_frame_16_colors
    }

    /// Screen cell at `(x, y)`.
    #[must_use]
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.size.cols || y >= self.size.rows {
            return None;
        }
        self.screen
            .get(usize::from(y) * usize::from(self.size.cols) + usize::from(x))
    }

    /// Screen row `y` as text, wide characters once.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        (0..self.size.cols)
            .filter_map(|x| self.cell(x, y).copied().and_then(Cell::output_char))
            .collect()
    }
}

impl ConsoleDriver for FakeDriver {
    fn size(&self) -> Size {
        self.size
    }

    fn force_16_colors(&self) -> bool {
        self.force_16_colors
    }

    fn write_to_console(
        &mut self,
        size: Size,
        cells: &[Cell],
        buffer_size: Size,
        window: Rect,
        force_16_colors: bool,
    ) -> Result<bool> {
        let limit = Size {
            cols: buffer_size.cols.min(self.size.cols),
            rows: buffer_size.rows.min(self.size.rows),
        };
        let window = super::clip_window(window, limit);
        if window.is_empty() || size.cols == 0 || cells.is_empty() {
            return Ok(false);
        }

        let cols = usize::from(self.size.cols);
        let (ox, oy) = (window.x.max(0), window.y.max(0));
        for (dy, row) in cells
            .chunks(usize::from(size.cols))
            .take(usize::from(window.height))
            .enumerate()
        {
            for (dx, cell) in row.iter().take(usize::from(window.width)).enumerate() {
                // ox + dx < cols and oy + dy < rows after clipping.
                #[allow(clippy::cast_sign_loss)]
                let idx = (oy as usize + dy) * cols + ox as usize + dx;
                if let Some(slot) = self.screen.get_mut(idx) {
                    *slot = *cell;
                }
            }
        }

        self.writes += 1;
        self.last_frame_16_colors = force_16_colors;
        trace!(writes = self.writes, ?window, "fake frame");
        Ok(true)
    }

    fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<()> {
        self.position = (x, y);
        Ok(())
    }

    fn cursor_visibility(&mut self) -> Option<CursorVisibility> {
        self.cursor.get(&mut self.hw_cursor)
    }

    fn set_cursor_visibility(&mut self, vis: CursorVisibility) -> bool {
        self.cursor.set(&mut self.hw_cursor, vis)
    }

    fn ensure_cursor_visibility(&mut self) -> bool {
        self.cursor.ensure(&mut self.hw_cursor)
    }

    fn force_refresh_cursor_visibility(&mut self) {
        self.cursor.force_refresh();
    }

    fn read_input(&mut self) -> Result<Option<Event>> {
        Ok(self.input.pop_front())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
