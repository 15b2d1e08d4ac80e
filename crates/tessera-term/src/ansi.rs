// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit. The frame encoder in `output` decides
// that; this module only knows the byte-level encoding.
//
// Cursor positions are 0-indexed in our API and converted to the 1-indexed
// coordinates the terminal expects.

use std::io::{self, Write};

use crate::color::{Color, ColorName16};
use crate::cursor::CursorVisibility;

/// Control Sequence Introducer.
pub const CSI: &str = "\x1b[";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` (CUP).
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Save cursor position and attributes (DECSC).
#[inline]
pub fn cursor_save(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore what [`cursor_save`] stored (DECRC).
#[inline]
pub fn cursor_restore(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

/// Apply a cursor visibility: DECTCEM for hidden, DECSCUSR plus DECTCEM
/// otherwise.
pub fn set_cursor_visibility(w: &mut impl Write, vis: CursorVisibility) -> io::Result<()> {
    match vis.decscusr() {
        None => cursor_hide(w),
        Some(style) => {
            write!(w, "\x1b[{style} q")?;
            cursor_show(w)
        }
    }
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// Enter the alternate screen buffer (DEC 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Leave the alternate screen buffer.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// 24-bit foreground.
#[inline]
pub fn fg_rgb(w: &mut impl Write, c: Color) -> io::Result<()> {
    write!(w, "\x1b[38;2;{};{};{}m", c.r, c.g, c.b)
}

/// 24-bit background.
#[inline]
pub fn bg_rgb(w: &mut impl Write, c: Color) -> io::Result<()> {
    write!(w, "\x1b[48;2;{};{};{}m", c.r, c.g, c.b)
}

/// Foreground from the 16-color set: 30–37, bright 90–97.
pub fn fg_named(w: &mut impl Write, name: ColorName16) -> io::Result<()> {
    let idx = u16::from(name.ansi_index());
    let code = if idx < 8 { 30 + idx } else { 82 + idx };
    write!(w, "\x1b[{code}m")
}

/// Background from the 16-color set: 40–47, bright 100–107.
pub fn bg_named(w: &mut impl Write, name: ColorName16) -> io::Result<()> {
    let idx = u16::from(name.ansi_index());
    let code = if idx < 8 { 40 + idx } else { 92 + idx };
    write!(w, "\x1b[{code}m")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse tracking granularity for SGR mouse reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseMode {
    /// No mouse reporting.
    Off,
    /// Button press and release (DEC 1000).
    Click,
    /// Buttons plus drag motion (DEC 1000 + 1002).
    #[default]
    Drag,
    /// All motion, buttons held or not (DEC 1000 + 1002 + 1003).
    Motion,
}

/// Enable SGR mouse tracking at the given granularity. `Off` disables it.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode) -> io::Result<()> {
    if mode == MouseMode::Off {
        return disable_mouse(w);
    }
    w.write_all(b"\x1b[?1000h")?;
    if matches!(mode, MouseMode::Drag | MouseMode::Motion) {
        w.write_all(b"\x1b[?1002h")?;
    }
    if mode == MouseMode::Motion {
        w.write_all(b"\x1b[?1003h")?;
    }
    w.write_all(b"\x1b[?1006h")
}

/// Disable all mouse tracking.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l")?;
    w.write_all(b"\x1b[?1003l")?;
    w.write_all(b"\x1b[?1002l")?;
    w.write_all(b"\x1b[?1000l")
}

/// Toggle any-motion reporting (DEC 1003) without touching click tracking.
///
/// Used to silence movement reports while waiting on a query reply.
#[inline]
pub fn set_mouse_motion(w: &mut impl Write, on: bool) -> io::Result<()> {
    w.write_all(if on { b"\x1b[?1003h" } else { b"\x1b[?1003l" })
}

// ─── Paste & Focus ──────────────────────────────────────────────────────────

/// Enable bracketed paste (DEC 2004).
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

/// Enable focus in/out reports (DEC 1004).
#[inline]
pub fn enable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004h")
}

/// Disable focus reports.
#[inline]
pub fn disable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004l")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_is_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| cursor_to(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_to_u16_max_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn save_restore() {
        assert_eq!(emit(|w| cursor_save(w)), "\x1b7");
        assert_eq!(emit(|w| cursor_restore(w)), "\x1b8");
    }

    #[test]
    fn visibility_sequences() {
        assert_eq!(emit(|w| set_cursor_visibility(w, CursorVisibility::Invisible)), "\x1b[?25l");
        assert_eq!(
            emit(|w| set_cursor_visibility(w, CursorVisibility::BoxFix)),
            "\x1b[2 q\x1b[?25h"
        );
        assert_eq!(
            emit(|w| set_cursor_visibility(w, CursorVisibility::Vertical)),
            "\x1b[5 q\x1b[?25h"
        );
    }

    // ── Colors ──────────────────────────────────────────────────────────

    #[test]
    fn true_color() {
        let c = Color::new(255, 128, 0);
        assert_eq!(emit(|w| fg_rgb(w, c)), "\x1b[38;2;255;128;0m");
        assert_eq!(emit(|w| bg_rgb(w, c)), "\x1b[48;2;255;128;0m");
    }

    #[test]
    fn named_foreground_codes() {
        assert_eq!(emit(|w| fg_named(w, ColorName16::Black)), "\x1b[30m");
        assert_eq!(emit(|w| fg_named(w, ColorName16::White)), "\x1b[37m");
        assert_eq!(emit(|w| fg_named(w, ColorName16::BrightBlack)), "\x1b[90m");
        assert_eq!(emit(|w| fg_named(w, ColorName16::BrightWhite)), "\x1b[97m");
    }

    #[test]
    fn named_background_codes() {
        assert_eq!(emit(|w| bg_named(w, ColorName16::Red)), "\x1b[41m");
        assert_eq!(emit(|w| bg_named(w, ColorName16::BrightRed)), "\x1b[101m");
    }

    // ── Modes ───────────────────────────────────────────────────────────

    #[test]
    fn mouse_modes() {
        assert_eq!(emit(|w| enable_mouse(w, MouseMode::Click)), "\x1b[?1000h\x1b[?1006h");
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Motion)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Off)),
            emit(|w| disable_mouse(w))
        );
    }

    #[test]
    fn motion_toggle() {
        assert_eq!(emit(|w| set_mouse_motion(w, false)), "\x1b[?1003l");
        assert_eq!(emit(|w| set_mouse_motion(w, true)), "\x1b[?1003h");
    }

    #[test]
    fn screen_and_modes() {
        assert_eq!(emit(|w| clear_screen(w)), "\x1b[2J");
        assert_eq!(emit(|w| reset(w)), "\x1b[0m");
        assert_eq!(emit(|w| enter_alt_screen(w)), "\x1b[?1049h");
        assert_eq!(emit(|w| exit_alt_screen(w)), "\x1b[?1049l");
        assert_eq!(emit(|w| enable_bracketed_paste(w)), "\x1b[?2004h");
        assert_eq!(emit(|w| disable_focus_reporting(w)), "\x1b[?1004l");
    }
}
