// SPDX-License-Identifier: MIT
//
// ScreenBuffer: the cell grid views paint into and drivers flush.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing (`y * width + x`). A row is
//     contiguous, so the left-to-right walk the encoders do is a linear scan.
//
//   - One dirty flag per row. Every write marks its row; `update_screen`
//     skips the frame entirely when nothing is dirty and clears the flags
//     after a flush.
//
//   - A pen: current position plus current attribute. `add_rune` and
//     `add_str` write at the pen and advance it, the way curses' addch does.
//
//   - An optional clip rectangle. Writes outside it are dropped (the pen
//     still advances, so text stays aligned when partially clipped).
//
//   - Wide characters occupy two columns: the codepoint, then a
//     continuation cell (ch = 0). Overwriting either half breaks the pair so
//     no orphaned half ever reaches the terminal.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::attribute::Attribute;
use crate::cell::Cell;
use crate::terminal::Size;

// ─── Rect ────────────────────────────────────────────────────────────────────

/// A rectangle in cell coordinates.
///
/// The origin is signed so partially scrolled-off regions can be expressed.
///
/// ```
/// use tessera_term::buffer::Rect;
///
/// let r = Rect::new(10, 5, 80, 24);
/// assert!(r.contains(10, 5));
/// assert!(r.contains(89, 28));
/// assert!(!r.contains(90, 5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl Rect {
    /// Rectangle with a signed origin.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.cols, size.rows)
    }

    /// Right edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height as i32
    }

    /// Zero area.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the cell `(px, py)` lies inside.
    #[inline]
    #[must_use]
    pub fn contains(self, px: u16, py: u16) -> bool {
        let px = i32::from(px);
        let py = i32::from(py);
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Overlap of two rectangles, `None` if disjoint.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 > x1 && y2 > y1 {
            // Both spans are positive and bounded by u16 inputs.
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Some(Self {
                x: x1,
                y: y1,
                width: (x2 - x1) as u16,
                height: (y2 - y1) as u16,
            })
        } else {
            None
        }
    }
}

// ─── ScreenBuffer ────────────────────────────────────────────────────────────

/// Row-major cell grid with per-row dirty tracking.
///
/// ```
/// use tessera_term::buffer::ScreenBuffer;
///
/// let mut buf = ScreenBuffer::new(10, 2);
/// buf.clear_dirty();
/// buf.move_to(2, 1);
/// buf.add_str("hi");
/// assert_eq!(buf.get(3, 1).unwrap().output_char(), Some('i'));
/// assert!(buf.is_row_dirty(1));
/// assert!(!buf.is_row_dirty(0));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ScreenBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    dirty: Vec<bool>,
    clip: Option<Rect>,
    col: u16,
    row: u16,
    attr: Attribute,
}

impl ScreenBuffer {
    // ─── Construction ────────────────────────────────────────────────────

    /// Blank buffer, every row dirty.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let size = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; size],
            dirty: vec![true; usize::from(height)],
            clip: None,
            col: 0,
            row: 0,
            attr: Attribute::DEFAULT,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Width in columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Height in rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Dimensions as a [`Size`].
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size {
            cols: self.width,
            rows: self.height,
        }
    }

    /// The whole buffer as a rectangle.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Cell at `(x, y)`, `None` out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row, `None` out of bounds.
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    /// The visible text of a row, continuation cells skipped.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .map(|r| r.iter().filter_map(|c| c.output_char()).collect())
            .unwrap_or_default()
    }

    // ─── Dirty tracking ─────────────────────────────────────────────────

    /// Whether row `y` changed since the last flush.
    #[inline]
    #[must_use]
    pub fn is_row_dirty(&self, y: u16) -> bool {
        self.dirty.get(usize::from(y)).copied().unwrap_or(false)
    }

    /// Whether any row changed since the last flush.
    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// Mark every row for redraw.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Forget all changes. Drivers call this after a flush.
    pub fn clear_dirty(&mut self) {
        self.dirty.fill(false);
    }

    #[inline]
    fn touch(&mut self, y: u16) {
        if let Some(d) = self.dirty.get_mut(usize::from(y)) {
            *d = true;
        }
    }

    // ─── Clip ────────────────────────────────────────────────────────────

    /// Restrict subsequent writes to `rect`.
    pub const fn set_clip(&mut self, rect: Rect) {
        self.clip = Some(rect);
    }

    /// Allow writes anywhere again.
    pub const fn reset_clip(&mut self) {
        self.clip = None;
    }

    /// Current clip rectangle.
    #[inline]
    #[must_use]
    pub const fn clip(&self) -> Option<Rect> {
        self.clip
    }

    #[inline]
    fn writable(&self, x: u16, y: u16) -> bool {
        self.in_bounds(x, y) && self.clip.is_none_or(|c| c.contains(x, y))
    }

    // ─── Pen ─────────────────────────────────────────────────────────────

    /// Move the pen.
    pub const fn move_to(&mut self, x: u16, y: u16) {
        self.col = x;
        self.row = y;
    }

    /// Pen position as `(col, row)`.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        (self.col, self.row)
    }

    /// Attribute used by subsequent pen writes.
    pub const fn set_attribute(&mut self, attr: Attribute) {
        self.attr = attr;
    }

    /// Current pen attribute.
    #[inline]
    #[must_use]
    pub const fn attribute(&self) -> Attribute {
        self.attr
    }

    // ─── Writing ─────────────────────────────────────────────────────────

    /// Store a cell as-is. Marks the row dirty. Ignores the clip.
    ///
    /// Returns `false` out of bounds.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        self.touch(y);
        true
    }

    /// Break any wide character touching `(x, y)`.
    fn break_wide_char_at(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);

        if self.cells[idx].is_continuation() && x > 0 {
            let prev = self.index(x - 1, y);
            self.cells[prev].ch = u32::from(b' ');
        }

        if x + 1 < self.width {
            let next = self.index(x + 1, y);
            if self.cells[next].is_continuation() {
                self.cells[next] = Cell::BLANK.with_attr(self.cells[next].attr);
            }
        }
    }

    /// Write `ch` of display width `w` (1 or 2) at the pen and advance.
    fn put(&mut self, ch: char, w: u16) {
        let (x, y) = (self.col, self.row);
        let attr = self.attr;

        if w == 2 && x.saturating_add(1) >= self.width {
            // No room for both halves.
            if self.writable(x, y) {
                self.break_wide_char_at(x, y);
                let idx = self.index(x, y);
                self.cells[idx] = Cell::new(' ', attr);
                self.touch(y);
            }
            self.col = self.col.saturating_add(1);
            return;
        }

        if self.writable(x, y) {
            self.break_wide_char_at(x, y);
            let idx = self.index(x, y);
            self.cells[idx] = Cell::new(ch, attr);
            self.touch(y);

            if w == 2 && self.writable(x + 1, y) {
                self.break_wide_char_at(x + 1, y);
                let next = self.index(x + 1, y);
                self.cells[next] = Cell::continuation(attr);
            }
        }
        self.col = self.col.saturating_add(w);
    }

    /// Write one character at the pen with the pen attribute and advance by
    /// its display width. Zero-width characters are dropped.
    pub fn add_rune(&mut self, ch: char) {
        match ch.width() {
            Some(1) => self.put(ch, 1),
            Some(2) => self.put(ch, 2),
            _ => {}
        }
    }

    /// Write a string at the pen, one grapheme cluster per cell.
    ///
    /// Each cluster stores its first codepoint; combining marks and joiners
    /// are folded into the cluster's width. Returns the columns consumed.
    pub fn add_str(&mut self, s: &str) -> u16 {
        let start = self.col;
        for grapheme in s.graphemes(true) {
            let Some(first) = grapheme.chars().next() else {
                continue;
            };
            match grapheme.width().min(2) {
                0 => {}
                1 => self.put(first, 1),
                _ => self.put(first, 2),
            }
        }
        self.col.saturating_sub(start)
    }

    /// Fill `rect` (clipped to bounds and clip) with `ch` in `attr`.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn fill_rect(&mut self, rect: Rect, ch: char, attr: Attribute) {
        let Some(mut area) = rect.intersect(self.bounds()) else {
            return;
        };
        if let Some(clip) = self.clip {
            let Some(clipped) = area.intersect(clip) else {
                return;
            };
            area = clipped;
        }

        // Intersection with bounds keeps these non-negative and in range.
        let x1 = area.x as u16;
        let y1 = area.y as u16;
        let x2 = area.right() as u16;
        let y2 = area.bottom() as u16;

        for y in y1..y2 {
            if x1 > 0 {
                self.break_wide_char_at(x1, y);
            }
            if x2 < self.width {
                self.break_wide_char_at(x2 - 1, y);
            }
            let start = self.index(x1, y);
            let end = self.index(x2, y);
            self.cells[start..end].fill(Cell::new(ch, attr));
            self.touch(y);
        }
    }

    /// Reset every cell to a space in `attr` and mark everything dirty.
    pub fn clear(&mut self, attr: Attribute) {
        self.cells.fill(Cell::BLANK.with_attr(attr));
        self.mark_all_dirty();
    }

    /// Change dimensions. Content is discarded; the pen and clip reset.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = usize::from(width) * usize::from(height);
        self.cells.clear();
        self.cells.resize(size, Cell::BLANK);
        self.dirty = vec![true; usize::from(height)];
        self.clip = None;
        self.col = 0;
        self.row = 0;
    }
}

impl std::fmt::Debug for ScreenBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScreenBuffer({}x{})", self.width, self.height)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn red() -> Attribute {
        Attribute::new(Color::new(255, 0, 0), Color::BLACK)
    }

    // ── Rect ────────────────────────────────────────────────────────────

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(0, 0, 10, 5);
        assert!(r.contains(0, 0));
        assert!(r.contains(9, 4));
        assert!(!r.contains(10, 0));
        assert!(!r.contains(0, 5));
    }

    #[test]
    fn rect_negative_origin() {
        let r = Rect::new(-5, -5, 10, 10);
        assert!(r.contains(0, 0));
        assert!(r.contains(4, 4));
        assert!(!r.contains(5, 0));
    }

    #[test]
    fn rect_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(Rect::new(10, 0, 5, 5)), None);
        assert!(Rect::new(0, 0, 0, 3).is_empty());
    }

    // ── Construction & dirty ────────────────────────────────────────────

    #[test]
    fn new_is_blank_and_dirty() {
        let buf = ScreenBuffer::new(4, 3);
        assert_eq!(buf.cells().len(), 12);
        assert!(buf.cells().iter().all(|c| *c == Cell::BLANK));
        assert!((0..3).all(|y| buf.is_row_dirty(y)));
    }

    #[test]
    fn zero_size_buffer() {
        let buf = ScreenBuffer::new(0, 0);
        assert!(buf.cells().is_empty());
        assert!(!buf.any_dirty());
        assert!(buf.get(0, 0).is_none());
    }

    #[test]
    fn set_marks_only_its_row() {
        let mut buf = ScreenBuffer::new(4, 3);
        buf.clear_dirty();
        assert!(buf.set(1, 2, Cell::new('x', red())));
        assert!(!buf.is_row_dirty(0));
        assert!(!buf.is_row_dirty(1));
        assert!(buf.is_row_dirty(2));
        assert!(!buf.set(4, 0, Cell::BLANK));
    }

    #[test]
    fn out_of_range_row_is_not_dirty() {
        let buf = ScreenBuffer::new(2, 2);
        assert!(!buf.is_row_dirty(9));
    }

    // ── Pen writes ──────────────────────────────────────────────────────

    #[test]
    fn add_str_uses_pen_attribute() {
        let mut buf = ScreenBuffer::new(10, 1);
        buf.set_attribute(red());
        assert_eq!(buf.add_str("abc"), 3);
        assert_eq!(buf.row_text(0), "abc       ");
        assert_eq!(buf.get(1, 0).unwrap().attr, red());
        assert_eq!(buf.position(), (3, 0));
    }

    #[test]
    fn wide_char_gets_continuation() {
        let mut buf = ScreenBuffer::new(4, 1);
        assert_eq!(buf.add_str("中a"), 3);
        assert_eq!(buf.get(0, 0).unwrap().output_char(), Some('中'));
        assert!(buf.get(1, 0).unwrap().is_continuation());
        assert_eq!(buf.get(2, 0).unwrap().output_char(), Some('a'));
    }

    #[test]
    fn wide_char_at_last_column_becomes_space() {
        let mut buf = ScreenBuffer::new(3, 1);
        buf.move_to(2, 0);
        buf.add_rune('中');
        assert_eq!(buf.get(2, 0).unwrap().output_char(), Some(' '));
        assert_eq!(buf.position(), (3, 0));
    }

    #[test]
    fn combining_mark_folds_into_cluster() {
        let mut buf = ScreenBuffer::new(4, 1);
        assert_eq!(buf.add_str("e\u{301}x"), 2);
        assert_eq!(buf.get(0, 0).unwrap().output_char(), Some('e'));
        assert_eq!(buf.get(1, 0).unwrap().output_char(), Some('x'));
    }

    #[test]
    fn zero_width_rune_is_dropped() {
        let mut buf = ScreenBuffer::new(4, 1);
        buf.add_rune('\u{200b}');
        assert_eq!(buf.position(), (0, 0));
    }

    #[test]
    fn overwriting_continuation_breaks_pair() {
        let mut buf = ScreenBuffer::new(4, 1);
        buf.add_str("中");
        buf.move_to(1, 0);
        buf.add_rune('z');
        assert_eq!(buf.get(0, 0).unwrap().output_char(), Some(' '));
        assert_eq!(buf.get(1, 0).unwrap().output_char(), Some('z'));
    }

    #[test]
    fn overwriting_wide_start_clears_continuation() {
        let mut buf = ScreenBuffer::new(4, 1);
        buf.add_str("中");
        buf.move_to(0, 0);
        buf.add_rune('z');
        assert!(!buf.get(1, 0).unwrap().is_continuation());
        assert_eq!(buf.row_text(0), "z   ");
    }

    #[test]
    fn clipped_writes_advance_pen() {
        let mut buf = ScreenBuffer::new(6, 1);
        buf.set_clip(Rect::new(2, 0, 2, 1));
        buf.add_str("abcdef");
        assert_eq!(buf.row_text(0), "  cd  ");
        assert_eq!(buf.position(), (6, 0));
        buf.reset_clip();
        assert!(buf.clip().is_none());
    }

    #[test]
    fn writes_past_right_edge_are_dropped() {
        let mut buf = ScreenBuffer::new(3, 1);
        assert_eq!(buf.add_str("abcdef"), 6);
        assert_eq!(buf.row_text(0), "abc");
    }

    // ── Fill / clear / resize ───────────────────────────────────────────

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut buf = ScreenBuffer::new(4, 2);
        buf.clear_dirty();
        buf.fill_rect(Rect::new(2, 1, 10, 10), '#', red());
        assert_eq!(buf.row_text(0), "    ");
        assert_eq!(buf.row_text(1), "  ##");
        assert!(!buf.is_row_dirty(0));
        assert!(buf.is_row_dirty(1));
    }

    #[test]
    fn fill_rect_respects_clip() {
        let mut buf = ScreenBuffer::new(4, 1);
        buf.set_clip(Rect::new(0, 0, 1, 1));
        buf.fill_rect(buf.bounds(), '#', red());
        assert_eq!(buf.row_text(0), "#   ");
    }

    #[test]
    fn fill_rect_breaks_straddling_wide_char() {
        let mut buf = ScreenBuffer::new(4, 1);
        buf.add_str("中");
        buf.fill_rect(Rect::new(1, 0, 3, 1), '.', red());
        assert_eq!(buf.row_text(0), " ...");
    }

    #[test]
    fn clear_resets_cells_and_dirties() {
        let mut buf = ScreenBuffer::new(3, 2);
        buf.add_str("xyz");
        buf.clear_dirty();
        buf.clear(red());
        assert!(buf.cells().iter().all(|c| c.ch == u32::from(b' ') && c.attr == red()));
        assert!(buf.is_row_dirty(0) && buf.is_row_dirty(1));
    }

    #[test]
    fn resize_discards_content() {
        let mut buf = ScreenBuffer::new(3, 2);
        buf.add_str("xyz");
        buf.set_clip(Rect::new(0, 0, 1, 1));
        buf.resize(5, 4);
        assert_eq!(buf.size(), Size { cols: 5, rows: 4 });
        assert_eq!(buf.cells().len(), 20);
        assert!(buf.clip().is_none());
        assert_eq!(buf.position(), (0, 0));
        assert!((0..4).all(|y| buf.is_row_dirty(y)));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", ScreenBuffer::new(80, 24)), "ScreenBuffer(80x24)");
    }
}
