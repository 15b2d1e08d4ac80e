// SPDX-License-Identifier: MIT
//
// Frame encoding: cells in, console bytes (or a legacy grid) out.
//
//   OutputBuffer accumulates a whole frame in memory so the driver hands
//   the terminal exactly one write per frame.
//
//   FrameEncoder walks the grid row by row and emits a color change only
//   where the attribute differs from the previous cell's. A line of text in
//   one color costs one SGR pair, not one per cell.
//
//   legacy_grid is the 16-color path for consoles without VT processing.
//   Every attribute is resolved to a console attribute word up front; the
//   Windows driver copies the result into CHAR_INFO records verbatim.
//
// Frame layout on the ANSI path:
//
//   ESC 7                       save cursor
//   CUP(row start) cells...     per row
//   SGR 0  ESC 8  CSI ?25l      reset, restore cursor, hide cursor

use std::io::{self, Write};

use crate::ansi;
use crate::attribute::Attribute;
use crate::buffer::Rect;
use crate::cell::Cell;
use crate::terminal::Size;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Frame-sized byte buffer, flushed with a single write.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    /// Empty buffer with 16 KB reserved.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is accumulated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a character as UTF-8.
    #[inline]
    pub fn push_char(&mut self, ch: char) {
        let mut enc = [0u8; 4];
        self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
    }

    /// Drop the contents, keep the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write everything to `w` in one call, then clear.
    ///
    /// # Errors
    ///
    /// Whatever `w` reports.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing goes through flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── FrameEncoder ────────────────────────────────────────────────────────────

/// Attribute-run encoder for the ANSI path.
///
/// Keeps the last emitted attribute across rows: a cursor move does not
/// reset SGR state, so a single-color screen costs one color change total.
pub struct FrameEncoder {
    force_16_colors: bool,
    last: Option<Attribute>,
}

impl FrameEncoder {
    /// Encoder for true color, or the 16 named colors when `force_16_colors`.
    #[must_use]
    pub const fn new(force_16_colors: bool) -> Self {
        Self {
            force_16_colors,
            last: None,
        }
    }

    /// Emit the color change for `attr` if it differs from the last one.
    pub fn apply(&mut self, out: &mut OutputBuffer, attr: Attribute) {
        if self.last == Some(attr) {
            return;
        }
        if self.force_16_colors {
            let (fg, bg) = attr.to_named();
            ansi::fg_named(out, fg).ok();
            ansi::bg_named(out, bg).ok();
        } else {
            ansi::fg_rgb(out, attr.fg).ok();
            ansi::bg_rgb(out, attr.bg).ok();
        }
        self.last = Some(attr);
    }

    /// Encode one row of cells.
    pub fn encode_row(&mut self, out: &mut OutputBuffer, row: &[Cell]) {
        for cell in row {
            let Some(ch) = cell.output_char() else {
                // The wide character before it already covered this column.
                continue;
            };
            self.apply(out, cell.attr);
            out.push_char(ch);
        }
    }
}

/// Encode a full frame into `out`.
///
/// `cells` is row-major with `size.cols` cells per row. Rows are placed at
/// the window's top-left corner, and at most `window.width` columns of at
/// most `window.height` rows are written. A short `cells` slice encodes the
/// rows it has.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_frame(
    out: &mut OutputBuffer,
    size: Size,
    cells: &[Cell],
    window: Rect,
    force_16_colors: bool,
) {
    ansi::cursor_save(out).ok();

    if size.cols > 0 {
        let origin_x = window.x.clamp(0, i32::from(u16::MAX)) as u16;
        let origin_y = window.y.clamp(0, i32::from(u16::MAX)) as u16;
        let mut encoder = FrameEncoder::new(force_16_colors);

        for (y, row) in cells
            .chunks(usize::from(size.cols))
            .take(usize::from(size.rows.min(window.height)))
            .enumerate()
        {
            let visible = row.len().min(usize::from(window.width));
            // y < size.rows, a u16.
            ansi::cursor_to(out, origin_x, origin_y.saturating_add(y as u16)).ok();
            encoder.encode_row(out, &row[..visible]);
        }
    }

    ansi::reset(out).ok();
    ansi::cursor_restore(out).ok();
    ansi::cursor_hide(out).ok();
}

// ─── Legacy grid ─────────────────────────────────────────────────────────────

/// `COMMON_LVB_LEADING_BYTE`: first column of a double-width character.
pub const LEADING_BYTE: u16 = 0x0100;

/// `COMMON_LVB_TRAILING_BYTE`: second column of a double-width character.
pub const TRAILING_BYTE: u16 = 0x0200;

/// One legacy console cell: a UTF-16 unit plus an attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCell {
    /// UTF-16 code unit. Characters outside the BMP become U+FFFD.
    pub ch: u16,
    /// Console attribute: colors in the low byte, wide-char flags above.
    pub attr: u16,
}

/// Translate cells for a console that only knows 16 colors.
///
/// A continuation cell repeats its owner's character with
/// [`TRAILING_BYTE`]; the owner gets [`LEADING_BYTE`].
#[must_use]
pub fn legacy_grid(cells: &[Cell]) -> Vec<LegacyCell> {
    let mut out: Vec<LegacyCell> = Vec::with_capacity(cells.len());
    for (i, cell) in cells.iter().enumerate() {
        let colors = cell.attr.legacy_value();
        let legacy = match cell.output_char() {
            Some(ch) => LegacyCell {
                ch: utf16_unit(ch),
                attr: colors,
            },
            None => {
                let owner = i.checked_sub(1).and_then(|p| out.get_mut(p));
                match owner {
                    Some(prev) if cells[i - 1].output_char().is_some() => {
                        prev.attr |= LEADING_BYTE;
                        LegacyCell {
                            ch: prev.ch,
                            attr: colors | TRAILING_BYTE,
                        }
                    }
                    _ => LegacyCell {
                        ch: u16::from(b' '),
                        attr: colors,
                    },
                }
            }
        };
        out.push(legacy);
    }
    out
}

fn utf16_unit(ch: char) -> u16 {
    let mut units = [0u16; 2];
    match ch.encode_utf16(&mut units) {
        [unit] => *unit,
        _ => 0xFFFD,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use pretty_assertions::assert_eq;

    fn attr(fg: (u8, u8, u8), bg: (u8, u8, u8)) -> Attribute {
        Attribute::new(fg.into(), bg.into())
    }

    fn frame(cols: u16, cells: &[Cell], force16: bool) -> String {
        let mut out = OutputBuffer::new();
        #[allow(clippy::cast_possible_truncation)]
        let rows = (cells.len() / usize::from(cols.max(1))) as u16;
        encode_frame(
            &mut out,
            Size { cols, rows },
            cells,
            Rect::new(0, 0, cols, rows),
            force16,
        );
        String::from_utf8(out.as_bytes().to_vec()).unwrap()
    }

    // ── OutputBuffer ────────────────────────────────────────────────────

    #[test]
    fn output_buffer_write_and_flush() {
        let mut buf = OutputBuffer::new();
        write!(buf, "hello {}", 42).unwrap();
        buf.push_char('中');
        assert_eq!(buf.len(), 11);
        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert_eq!(sink, "hello 42中".as_bytes());
        assert!(buf.is_empty());
    }

    #[test]
    fn flush_empty_writes_nothing() {
        let mut buf = OutputBuffer::new();
        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert!(sink.is_empty());
    }

    // ── ANSI frames ─────────────────────────────────────────────────────

    #[test]
    fn one_color_change_per_run() {
        let a = attr((255, 0, 0), (0, 0, 0));
        let b = attr((0, 255, 0), (0, 0, 0));
        let cells = [
            Cell::new('a', a),
            Cell::new('b', a),
            Cell::new('c', a),
            Cell::new('d', b),
        ];
        assert_eq!(
            frame(4, &cells, false),
            "\x1b7\x1b[1;1H\
             \x1b[38;2;255;0;0m\x1b[48;2;0;0;0mabc\
             \x1b[38;2;0;255;0m\x1b[48;2;0;0;0md\
             \x1b[0m\x1b8\x1b[?25l"
        );
    }

    #[test]
    fn attribute_carries_across_rows() {
        let a = attr((1, 2, 3), (4, 5, 6));
        let cells = [Cell::new('x', a), Cell::new('y', a)];
        let out = frame(1, &cells, false);
        assert_eq!(out.matches("\x1b[38;2;").count(), 1);
        assert!(out.contains("\x1b[1;1H"));
        assert!(out.contains("\x1b[2;1H"));
    }

    #[test]
    fn force_16_uses_named_codes() {
        let cells = [Cell::new('x', attr((250, 0, 0), (0, 0, 120)))];
        assert_eq!(
            frame(1, &cells, true),
            "\x1b7\x1b[1;1H\x1b[91m\x1b[44mx\x1b[0m\x1b8\x1b[?25l"
        );
    }

    #[test]
    fn sentinel_is_space_and_continuation_is_skipped() {
        let a = Attribute::DEFAULT;
        let cells = [
            Cell::new('\x1b', a),
            Cell::new('中', a),
            Cell::continuation(a),
            Cell::new('!', a),
        ];
        let out = frame(4, &cells, false);
        assert!(out.contains(" 中!"));
        // save, CUP, fg, bg, reset, restore, hide: no raw ESC from the cell.
        assert_eq!(out.matches('\x1b').count(), 7);
    }

    #[test]
    fn window_origin_offsets_rows() {
        let mut out = OutputBuffer::new();
        let cells = [Cell::BLANK; 2];
        encode_frame(
            &mut out,
            Size { cols: 1, rows: 2 },
            &cells,
            Rect::new(3, 5, 1, 2),
            false,
        );
        let s = String::from_utf8(out.as_bytes().to_vec()).unwrap();
        assert!(s.contains("\x1b[6;4H"));
        assert!(s.contains("\x1b[7;4H"));
    }

    #[test]
    fn window_clips_columns_and_rows() {
        let a = Attribute::DEFAULT;
        let cells = [
            Cell::new('a', a),
            Cell::new('b', a),
            Cell::new('c', a),
            Cell::new('d', a),
        ];
        let mut out = OutputBuffer::new();
        encode_frame(&mut out, Size { cols: 2, rows: 2 }, &cells, Rect::new(0, 0, 1, 1), false);
        let s = String::from_utf8(out.as_bytes().to_vec()).unwrap();
        assert!(s.contains('a'));
        assert!(!s.contains('b'));
        assert!(!s.contains('c'));
    }

    #[test]
    fn zero_width_frame_is_just_framing() {
        assert_eq!(frame(0, &[], false), "\x1b7\x1b[0m\x1b8\x1b[?25l");
    }

    #[test]
    fn short_cell_slice_encodes_available_rows() {
        let mut out = OutputBuffer::new();
        encode_frame(
            &mut out,
            Size { cols: 2, rows: 5 },
            &[Cell::BLANK; 3],
            Rect::new(0, 0, 2, 5),
            false,
        );
        let s = String::from_utf8(out.as_bytes().to_vec()).unwrap();
        assert!(s.contains("\x1b[2;1H"));
        assert!(!s.contains("\x1b[3;1H"));
    }

    // ── Legacy grid ─────────────────────────────────────────────────────

    #[test]
    fn legacy_grid_resolves_attributes() {
        let cells = [Cell::new('A', Attribute::new(Color::WHITE, Color::new(0, 0, 128)))];
        let grid = legacy_grid(&cells);
        assert_eq!(grid, vec![LegacyCell { ch: u16::from(b'A'), attr: 0x1F }]);
    }

    #[test]
    fn legacy_grid_marks_wide_pairs() {
        let a = Attribute::DEFAULT;
        let grid = legacy_grid(&[Cell::new('中', a), Cell::continuation(a)]);
        assert_eq!(grid[0].attr, 0x07 | LEADING_BYTE);
        assert_eq!(grid[1].attr, 0x07 | TRAILING_BYTE);
        assert_eq!(grid[0].ch, grid[1].ch);
    }

    #[test]
    fn legacy_grid_orphan_continuation_is_space() {
        let grid = legacy_grid(&[Cell::continuation(Attribute::DEFAULT)]);
        assert_eq!(grid[0].ch, u16::from(b' '));
    }

    #[test]
    fn legacy_grid_sentinel_and_astral() {
        let a = Attribute::DEFAULT;
        let grid = legacy_grid(&[Cell::new('\x1b', a), Cell::new('🔥', a)]);
        assert_eq!(grid[0].ch, u16::from(b' '));
        assert_eq!(grid[1].ch, 0xFFFD);
    }
}
