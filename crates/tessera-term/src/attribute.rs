// SPDX-License-Identifier: MIT
//
// Attribute: the foreground/background pairing applied to a cell.
//
// Two attributes are equal iff both colors are equal. That equality is the
// hot comparison in the ANSI output path: an SGR color change is emitted
// only when the attribute differs from the previous cell's.
//
// The legacy Windows path wants a 16-bit console attribute word instead of
// RGB. `legacy_value()` resolves it once per cell through the nearest named
// colors, so the driver never does color math while filling its grid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{Color, ColorName16};

/// A foreground/background color pair.
///
/// ```
/// use tessera_term::attribute::Attribute;
/// use tessera_term::color::{Color, ColorName16};
///
/// let attr = Attribute::new(ColorName16::BrightWhite.into(), ColorName16::Blue.into());
/// assert_eq!(attr.legacy_value(), 0x1F);
/// assert_eq!(attr, Attribute::new(Color::WHITE, Color::new(0, 0, 128)));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Text color.
    pub fg: Color,
    /// Fill color behind the text.
    pub bg: Color,
}

impl Attribute {
    /// Light gray on black, the classic console default.
    pub const DEFAULT: Self = Self {
        fg: Color::new(192, 192, 192),
        bg: Color::BLACK,
    };

    /// Create an attribute from explicit colors.
    #[inline]
    #[must_use]
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self { fg, bg }
    }

    /// Same background, different foreground.
    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    /// Same foreground, different background.
    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    /// Foreground and background swapped.
    #[inline]
    #[must_use]
    pub const fn inverted(self) -> Self {
        Self {
            fg: self.bg,
            bg: self.fg,
        }
    }

    /// The nearest named colors as `(foreground, background)`.
    #[must_use]
    pub fn to_named(self) -> (ColorName16, ColorName16) {
        (self.fg.closest_named(), self.bg.closest_named())
    }

    /// Windows console attribute word: foreground console index in the low
    /// nibble, background console index in the next.
    #[must_use]
    pub fn legacy_value(self) -> u16 {
        let (fg, bg) = self.to_named();
        u16::from(fg.console_index()) | (u16::from(bg.console_index()) << 4)
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({} on {})", self.fg, self.bg)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
