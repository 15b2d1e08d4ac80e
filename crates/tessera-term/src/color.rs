// SPDX-License-Identifier: MIT
//
// tessera color model: plain 24-bit RGB with a bridge to the 16 named
// ANSI colors.
//
// Every cell on screen carries two of these (foreground and background).
// They are `Copy`, hash structurally, and compare exactly, which is what
// the output coalescer and the quantizer's nearest-color cache need.
//
// Terminals that can't do true color get the 16 named colors instead.
// The mapping goes through `Color::closest_named()`: a squared-distance
// scan over the xterm reference values. The Windows console numbers the
// same 16 colors in a different order (BGR bit layout), so `ColorName16`
// knows both its ANSI index and its console index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Color ───────────────────────────────────────────────────────────────────

/// A 24-bit RGB color.
///
/// # Examples
///
/// ```
/// use tessera_term::color::{Color, ColorName16};
///
/// let teal = Color::new(0, 128, 128);
/// assert_eq!(teal.closest_named(), ColorName16::Cyan);
///
/// let parsed: Color = "#ff0000".parse().unwrap();
/// assert_eq!(parsed, Color::new(255, 0, 0));
/// assert_eq!(parsed.to_string(), "#ff0000");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel, 0–255.
    pub r: u8,
    /// Green channel, 0–255.
    pub g: u8,
    /// Blue channel, 0–255.
    pub b: u8,
}

impl Color {
    /// Create a color from its three channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Channels as an `[r, g, b]` array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Squared Euclidean RGB distance. Cheap, integer-only; used wherever
    /// only the ordering of distances matters.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
    }

    /// The named 16-color entry nearest to this color.
    ///
    /// Ties go to the entry that appears first in [`ColorName16::ALL`].
    #[must_use]
    pub fn closest_named(self) -> ColorName16 {
        let mut best = ColorName16::Black;
        let mut best_distance = u32::MAX;
        for name in ColorName16::ALL {
            let d = self.distance_squared(name.rgb());
            if d < best_distance {
                best = name;
                best_distance = d;
            }
        }
        best
    }

    /// Parse `#RGB` or `#RRGGBB` (the `#` is optional).
    #[must_use]
    pub fn hex(s: &str) -> Option<Self> {
        parse_hex(s)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({}, {}, {})", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<ColorName16> for Color {
    fn from(name: ColorName16) -> Self {
        name.rgb()
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Why a color string failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    /// The input was empty or whitespace.
    #[error("empty color string")]
    Empty,

    /// Neither a hex color nor a known color name.
    #[error("unknown color: {0:?}")]
    Unknown(String),
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColorParseError::Empty);
        }
        if let Some(color) = parse_hex(s) {
            return Ok(color);
        }
        s.parse::<ColorName16>().map(Self::from)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ─── Named Colors ────────────────────────────────────────────────────────────

/// The 16 named terminal colors, in ANSI index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorName16 {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

/// Reference RGB values for the 16 named colors (xterm defaults).
///
/// Individual terminals override these, but for nearest-match purposes
/// they are a reasonable common ground.
const ANSI16_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),       // 0: Black
    (128, 0, 0),     // 1: Red
    (0, 128, 0),     // 2: Green
    (128, 128, 0),   // 3: Yellow
    (0, 0, 128),     // 4: Blue
    (128, 0, 128),   // 5: Magenta
    (0, 128, 128),   // 6: Cyan
    (192, 192, 192), // 7: White
    (128, 128, 128), // 8: Bright Black
    (255, 0, 0),     // 9: Bright Red
    (0, 255, 0),     // 10: Bright Green
    (255, 255, 0),   // 11: Bright Yellow
    (0, 0, 255),     // 12: Bright Blue
    (255, 0, 255),   // 13: Bright Magenta
    (0, 255, 255),   // 14: Bright Cyan
    (255, 255, 255), // 15: Bright White
];

impl ColorName16 {
    /// All 16 names in ANSI index order.
    pub const ALL: [Self; 16] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
        Self::BrightBlack,
        Self::BrightRed,
        Self::BrightGreen,
        Self::BrightYellow,
        Self::BrightBlue,
        Self::BrightMagenta,
        Self::BrightCyan,
        Self::BrightWhite,
    ];

    /// ANSI palette index (0–15), as used by SGR 30–37 / 90–97.
    #[inline]
    #[must_use]
    pub const fn ansi_index(self) -> u8 {
        self as u8
    }

    /// Windows console color index (0–15).
    ///
    /// The console packs colors as `intensity | red | green | blue` bits, so
    /// ANSI red (bit 0) becomes console index 4 and ANSI blue becomes 1.
    #[must_use]
    pub const fn console_index(self) -> u8 {
        let ansi = self as u8;
        let red = ansi & 0b001;
        let green = ansi & 0b010;
        let blue = ansi & 0b100;
        (ansi & 0b1000) | (red << 2) | green | (blue >> 2)
    }

    /// Reference RGB value for this name.
    #[must_use]
    pub const fn rgb(self) -> Color {
        let (r, g, b) = ANSI16_RGB[self as usize];
        Color::new(r, g, b)
    }

    /// Lookup by ANSI index. Returns `None` above 15.
    #[must_use]
    pub const fn from_ansi_index(idx: u8) -> Option<Self> {
        if idx < 16 {
            Some(Self::ALL[idx as usize])
        } else {
            None
        }
    }

    /// Canonical lowercase snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
            Self::BrightBlack => "bright_black",
            Self::BrightRed => "bright_red",
            Self::BrightGreen => "bright_green",
            Self::BrightYellow => "bright_yellow",
            Self::BrightBlue => "bright_blue",
            Self::BrightMagenta => "bright_magenta",
            Self::BrightCyan => "bright_cyan",
            Self::BrightWhite => "bright_white",
        }
    }
}

impl fmt::Display for ColorName16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorName16 {
    type Err = ColorParseError;

    /// Case-insensitive; `_`, `-` and spaces are ignored, and `gray`/`grey`
    /// alias the console names (`gray` = white, `dark_gray` = bright black).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let name = match key.as_str() {
            "black" => Self::Black,
            "red" | "darkred" => Self::Red,
            "green" | "darkgreen" => Self::Green,
            "yellow" | "darkyellow" | "brown" => Self::Yellow,
            "blue" | "darkblue" => Self::Blue,
            "magenta" | "darkmagenta" => Self::Magenta,
            "cyan" | "darkcyan" => Self::Cyan,
            "white" | "gray" | "grey" => Self::White,
            "brightblack" | "darkgray" | "darkgrey" => Self::BrightBlack,
            "brightred" => Self::BrightRed,
            "brightgreen" => Self::BrightGreen,
            "brightyellow" => Self::BrightYellow,
            "brightblue" => Self::BrightBlue,
            "brightmagenta" => Self::BrightMagenta,
            "brightcyan" => Self::BrightCyan,
            "brightwhite" => Self::BrightWhite,
            _ => return Err(ColorParseError::Unknown(s.to_owned())),
        };
        Ok(name)
    }
}

// ─── Hex Parsing ─────────────────────────────────────────────────────────────

fn parse_hex(s: &str) -> Option<Color> {
    let s = s.strip_prefix('#').unwrap_or(s);
    let bytes = s.as_bytes();

    match bytes.len() {
        3 => {
            let r = parse_hex_digit(bytes[0])?;
            let g = parse_hex_digit(bytes[1])?;
            let b = parse_hex_digit(bytes[2])?;
            Some(Color::new(r << 4 | r, g << 4 | g, b << 4 | b))
        }
        6 => {
            let r = parse_hex_byte(&bytes[0..2])?;
            let g = parse_hex_byte(&bytes[2..4])?;
            let b = parse_hex_byte(&bytes[4..6])?;
            Some(Color::new(r, g, b))
        }
        _ => None,
    }
}

#[inline]
const fn parse_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[inline]
fn parse_hex_byte(bytes: &[u8]) -> Option<u8> {
    let hi = parse_hex_digit(bytes[0])?;
    let lo = parse_hex_digit(bytes[1])?;
    Some(hi << 4 | lo)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
