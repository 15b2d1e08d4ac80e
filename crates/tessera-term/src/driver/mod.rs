// SPDX-License-Identifier: MIT
//
// Console drivers.
//
// A driver owns one console: it puts cell grids on screen, keeps the
// hardware cursor in the requested state and turns raw input into events.
//
//   AnsiDriver     VT/xterm terminals, any `Write` sink
//   WindowsConsole the Win32 console API, legacy or VT output
//   FakeDriver     in-memory console for tests
//
// Every driver renders through `write_to_console`. `update_screen` is the
// frame entry point and is shared: it skips clean buffers, writes the whole
// grid in one call, clears the dirty rows, then re-applies the cursor
// visibility the frame may have clobbered.

pub mod ansi;
pub mod fake;
#[cfg(windows)]
pub mod windows;

pub use self::ansi::AnsiDriver;
pub use self::fake::FakeDriver;
#[cfg(windows)]
pub use self::windows::WindowsConsole;

use crate::buffer::{Rect, ScreenBuffer};
use crate::cell::Cell;
use crate::cursor::CursorVisibility;
use crate::error::Result;
use crate::event::Event;
use crate::terminal::Size;

/// One console backend.
pub trait ConsoleDriver {
    /// Current console size.
    fn size(&self) -> Size;

    /// Whether output is limited to the 16 named colors.
    fn force_16_colors(&self) -> bool;

    /// Write a row-major grid of `size` cells into the `window` region of
    /// a console whose screen buffer is `buffer_size`. Returns whether
    /// anything was written.
    ///
    /// # Errors
    ///
    /// I/O or native console failure.
    fn write_to_console(
        &mut self,
        size: Size,
        cells: &[Cell],
        buffer_size: Size,
        window: Rect,
        force_16_colors: bool,
    ) -> Result<bool>;

    /// Put `buffer` on screen if any row changed since the last frame.
    ///
    /// # Errors
    ///
    /// Whatever [`write_to_console`](Self::write_to_console) reports. Dirty
    /// flags are left set on failure so the next frame retries.
    fn update_screen(&mut self, buffer: &mut ScreenBuffer) -> Result<bool> {
        if !buffer.any_dirty() {
            return Ok(false);
        }

        let size = buffer.size();
        let window = clip_window(Rect::from_size(size), self.size());
        let force = self.force_16_colors();
        let written = self.write_to_console(size, buffer.cells(), self.size(), window, force)?;
        buffer.clear_dirty();
        self.ensure_cursor_visibility();
        Ok(written)
    }

    /// Move the hardware cursor to the 0-indexed cell `(x, y)`.
    ///
    /// # Errors
    ///
    /// I/O or native console failure.
    fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<()>;

    /// Last requested cursor visibility, else the console's initial one.
    fn cursor_visibility(&mut self) -> Option<CursorVisibility>;

    /// Request a cursor visibility. Returns whether it is on screen now;
    /// a `false` request is kept pending.
    fn set_cursor_visibility(&mut self, vis: CursorVisibility) -> bool;

    /// Re-apply a pending or stale cursor visibility. Never fails.
    fn ensure_cursor_visibility(&mut self) -> bool;

    /// Mark the applied cursor visibility as needing re-application.
    fn force_refresh_cursor_visibility(&mut self);

    /// Next input event, or `None` if nothing is ready.
    ///
    /// # Errors
    ///
    /// I/O or native console failure.
    fn read_input(&mut self) -> Result<Option<Event>>;
}

/// The part of `window` that fits in a screen buffer of `buffer_size`.
/// The origin is kept; only width and height shrink.
#[must_use]
pub fn clip_window(window: Rect, buffer_size: Size) -> Rect {
    let fit = |origin: i32, len: u16, limit: u16| -> u16 {
        let room = i32::from(limit) - origin.max(0);
        // 0 <= room <= limit once clamped.
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let room = room.max(0) as u16;
        len.min(room)
    };
    Rect {
        width: fit(window.x, window.width, buffer_size.cols),
        height: fit(window.y, window.height, buffer_size.rows),
        ..window
    }
}
