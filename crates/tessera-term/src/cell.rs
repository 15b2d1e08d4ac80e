// SPDX-License-Identifier: MIT
//
// Cell: one character position on the console grid.
//
// A cell holds a Unicode codepoint and an `Attribute`. Views produce them,
// the screen buffer stores them, and the drivers turn them into bytes.
//
// Two codepoints are special:
//
//   0    continuation ("empty") cell. Wide characters (CJK, some emoji)
//          occupy two columns; the second column is a continuation cell.
//          It carries the attribute for background fill but produces no
//          character output of its own.
//
//   ESC  the sentinel rune. A raw 0x1B must never reach the terminal
//          inside the character stream (it would start an escape sequence),
//          so drivers write a space in its place.

use std::fmt;

use crate::attribute::Attribute;

/// Continuation marker.
const CONTINUATION: u32 = 0;

/// Sentinel codepoint, rendered as a space.
pub const SENTINEL: u32 = 0x1B;

const SPACE: u32 = b' ' as u32;

/// A single console cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Unicode codepoint. `0` marks a continuation cell.
    pub ch: u32,
    /// Colors for this position.
    pub attr: Attribute,
}

impl Cell {
    /// A space in the default attribute.
    pub const BLANK: Self = Self {
        ch: SPACE,
        attr: Attribute::DEFAULT,
    };

    /// A cell with the given character and attribute.
    #[inline]
    #[must_use]
    pub const fn new(ch: char, attr: Attribute) -> Self {
        Self { ch: ch as u32, attr }
    }

    /// The second column of a wide character.
    #[inline]
    #[must_use]
    pub const fn continuation(attr: Attribute) -> Self {
        Self {
            ch: CONTINUATION,
            attr,
        }
    }

    /// Whether this is a continuation ("empty") cell.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// The character to put on the wire for this cell.
    ///
    /// `None` for continuation cells; a space for the sentinel and for any
    /// invalid scalar value.
    #[inline]
    #[must_use]
    pub const fn output_char(self) -> Option<char> {
        match self.ch {
            CONTINUATION => None,
            SENTINEL => Some(' '),
            cp => match char::from_u32(cp) {
                Some(ch) => Some(ch),
                None => Some(' '),
            },
        }
    }

    /// Same cell, different attribute.
    #[inline]
    #[must_use]
    pub const fn with_attr(self, attr: Attribute) -> Self {
        Self { attr, ..self }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_continuation() {
            write!(f, "Cell(continuation, {:?})", self.attr)
        } else {
            let ch = char::from_u32(self.ch).unwrap_or('?');
            write!(f, "Cell({ch:?}, {:?})", self.attr)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
