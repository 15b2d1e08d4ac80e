// SPDX-License-Identifier: MIT
//! Sixel output.
//!
//! A Sixel image is a DCS string: raster attributes, a palette given in
//! RGB percent, then the picture in horizontal bands six pixels tall. Each
//! band is painted once per color: `#i` selects the color, and every
//! following byte `63 + bits` covers one column, bit 0 being the band's
//! top row. `$` returns to the start of the band for the next color, `-`
//! moves down to the next band, and `!n` repeats the next byte `n` times.
//!
//! Whether a terminal speaks Sixel is learned from its primary device
//! attributes: `4` in the `CSI ? … c` reply. How many color registers it
//! has comes from XTSMGRAPHICS, `CSI ? 1 ; 0 ; n S`.

use std::fmt::Write as _;

use tessera_term::color::Color;
use tessera_term::request::{AnsiReply, AnsiResponse};
use tracing::debug;

use crate::config::QuantizerConfig;
use crate::quantizer::ColorQuantizer;

const BAND: usize = 6;
const EMPTY: u8 = b'?';

/// Runs longer than this are written as `!n`.
const MIN_REPEAT: usize = 4;

// ---------------------------------------------------------------------------
// Support detection
// ---------------------------------------------------------------------------

/// What the terminal told us about its Sixel abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SixelSupport {
    pub supported: bool,
    /// Color registers; 256 until the terminal says otherwise.
    pub max_palette_colors: usize,
    /// Character cell size in pixels, (width, height).
    pub cell_size: Option<(u16, u16)>,
}

impl Default for SixelSupport {
    fn default() -> Self {
        Self {
            supported: false,
            max_palette_colors: 256,
            cell_size: None,
        }
    }
}

impl SixelSupport {
    /// From a parsed DA1 reply.
    #[must_use]
    pub fn from_reply(reply: &AnsiReply) -> Self {
        let supported =
            reply.terminator == "c" && reply.code == "?" && reply.values.iter().any(|v| v == "4");
        Self {
            supported,
            ..Self::default()
        }
    }

    /// From a settled DA1 request; unsupported if it failed.
    #[must_use]
    pub fn from_response(response: &AnsiResponse) -> Self {
        if !response.is_success() {
            return Self::default();
        }
        response
            .reply()
            .map_or_else(Self::default, |reply| Self::from_reply(&reply))
    }

    /// Record the cell size from a `CSI 6 ; h ; w t` reply. Other replies
    /// leave it unchanged.
    #[must_use]
    pub fn with_cell_size(mut self, reply: &AnsiReply) -> Self {
        if reply.terminator == "t" && reply.values.first().is_some_and(|v| v == "6") {
            let height = reply.number(1).and_then(|h| u16::try_from(h).ok());
            let width = reply.number(2).and_then(|w| u16::try_from(w).ok());
            if let (Some(w), Some(h)) = (width, height) {
                self.cell_size = Some((w, h));
            }
        }
        self
    }

    /// Record the color register count from a `CSI ? 1 ; 0 ; n S` reply.
    /// Failed reads (status other than 0), zero counts and other replies
    /// leave it unchanged.
    #[must_use]
    pub fn with_color_registers(mut self, reply: &AnsiReply) -> Self {
        let registers = reply.terminator == "S"
            && reply.code == "?"
            && reply.values.first().is_some_and(|v| v == "1")
            && reply.values.get(1).is_some_and(|v| v == "0");
        if registers {
            match reply.number(2).and_then(|n| usize::try_from(n).ok()) {
                Some(n) if n > 0 => self.max_palette_colors = n,
                _ => {}
            }
        }
        self
    }

    /// Like [`Self::with_color_registers`] for a settled request.
    #[must_use]
    pub fn with_color_response(self, response: &AnsiResponse) -> Self {
        match response.reply() {
            Some(reply) if response.is_success() => self.with_color_registers(&reply),
            _ => self,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Turns color grids into Sixel strings through a [`ColorQuantizer`].
#[derive(Debug)]
pub struct SixelEncoder {
    quantizer: ColorQuantizer,
}

impl SixelEncoder {
    #[must_use]
    pub const fn new(quantizer: ColorQuantizer) -> Self {
        Self { quantizer }
    }

    /// Encoder whose palette size is capped by what the terminal reported.
    #[must_use]
    pub fn from_config(config: &QuantizerConfig, support: &SixelSupport) -> Self {
        let max_colors = config.max_colors.min(support.max_palette_colors);
        Self::new(ColorQuantizer::from_config(config).with_max_colors(max_colors))
    }

    #[must_use]
    pub const fn quantizer(&self) -> &ColorQuantizer {
        &self.quantizer
    }

    /// Encode `pixels` (rows of colors, top to bottom). Rows may differ in
    /// length; missing pixels stay transparent. An empty grid encodes to an
    /// empty string.
    pub fn encode(&mut self, pixels: &[Vec<Color>]) -> String {
        let height = pixels.len();
        let width = pixels.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return String::new();
        }

        self.quantizer.build_palette(pixels);
        let Some(indices) = self.quantizer.quantize(pixels) else {
            return String::new();
        };
        let palette = self.quantizer.palette();

        let mut out = String::new();
        let _ = write!(out, "\x1bP0;0;0q\"1;1;{width};{height}");
        for (i, c) in palette.iter().enumerate() {
            let _ = write!(
                out,
                "#{i};2;{};{};{}",
                percent(c.r),
                percent(c.g),
                percent(c.b)
            );
        }

        for (band, rows) in indices.chunks(BAND).enumerate() {
            if band > 0 {
                out.push('-');
            }
            let mut first = true;
            for color in 0..palette.len() {
                let Some(sixels) = band_sixels(rows, width, color) else {
                    continue;
                };
                if !first {
                    out.push('$');
                }
                first = false;
                let _ = write!(out, "#{color}");
                push_runs(&mut out, &sixels);
            }
        }

        out.push_str("\x1b\\");
        debug!(width, height, colors = palette.len(), bytes = out.len(), "sixel encoded");
        out
    }
}

/// 0–255 channel to the 0–100 Sixel scale, rounded.
fn percent(v: u8) -> u32 {
    (u32::from(v) * 100 + 127) / 255
}

/// Sixel bytes for `color` across one band, trailing empty columns
/// dropped. `None` if the color does not occur in the band.
fn band_sixels(rows: &[Vec<usize>], width: usize, color: usize) -> Option<Vec<u8>> {
    let mut sixels: Vec<u8> = (0..width)
        .map(|x| {
            let bits = rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.get(x) == Some(&color))
                .fold(0u8, |acc, (y, _)| acc | (1 << y));
            EMPTY + bits
        })
        .collect();
    while sixels.last() == Some(&EMPTY) {
        sixels.pop();
    }
    (!sixels.is_empty()).then_some(sixels)
}

fn push_runs(out: &mut String, sixels: &[u8]) {
    let mut rest = sixels;
    while let Some(&b) = rest.first() {
        let run = rest.iter().take_while(|&&x| x == b).count();
        let ch = char::from(b);
        if run >= MIN_REPEAT {
            let _ = write!(out, "!{run}{ch}");
        } else {
            out.extend(std::iter::repeat_n(ch, run));
        }
        rest = &rest[run..];
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Euclidean;
    use crate::popularity::PopularityPalette;
    use pretty_assertions::assert_eq;

    const RED: Color = Color::new(255, 0, 0);
    const BLUE: Color = Color::new(0, 0, 255);

    fn encoder() -> SixelEncoder {
        SixelEncoder::new(ColorQuantizer::new(
            Box::new(Euclidean),
            Box::new(PopularityPalette::new(Box::new(Euclidean), 0.0)),
        ))
    }

    // ── Encoding ──

    #[test]
    fn empty_grid_is_empty_string() {
        assert_eq!(encoder().encode(&[]), "");
        assert_eq!(encoder().encode(&[vec![], vec![]]), "");
    }

    #[test]
    fn single_pixel() {
        assert_eq!(
            encoder().encode(&[vec![RED]]),
            "\x1bP0;0;0q\"1;1;1;1#0;2;100;0;0#0@\x1b\\"
        );
    }

    #[test]
    fn colors_share_a_band() {
        assert_eq!(
            encoder().encode(&[vec![RED, BLUE]]),
            "\x1bP0;0;0q\"1;1;2;1#0;2;100;0;0#1;2;0;0;100#0@$#1?@\x1b\\"
        );
    }

    #[test]
    fn long_runs_are_compressed() {
        let out = encoder().encode(&[vec![RED; 8]]);
        assert!(out.ends_with("#0!8@\x1b\\"), "{out:?}");
        let out = encoder().encode(&[vec![RED; 3]]);
        assert!(out.ends_with("#0@@@\x1b\\"), "{out:?}");
    }

    #[test]
    fn seven_rows_make_two_bands() {
        let out = encoder().encode(&vec![vec![RED]; 7]);
        // Six rows set every bit (63 + 63 = '~'), the seventh starts a band.
        assert!(out.ends_with("#0~-#0@\x1b\\"), "{out:?}");
    }

    #[test]
    fn ragged_rows_leave_gaps() {
        let out = encoder().encode(&[vec![RED, RED], vec![RED]]);
        // Column 0 has rows 0 and 1 (bits 0b11), column 1 only row 0.
        assert!(out.contains("\"1;1;2;2"));
        assert!(out.ends_with("#0B@\x1b\\"), "{out:?}");
    }

    #[test]
    fn percent_scale() {
        assert_eq!(percent(0), 0);
        assert_eq!(percent(255), 100);
        assert_eq!(percent(128), 50);
    }

    // ── Detection ──

    fn reply(raw: &str) -> AnsiReply {
        AnsiReply::parse(raw).unwrap()
    }

    #[test]
    fn da1_with_sixel_attribute() {
        assert!(SixelSupport::from_reply(&reply("\x1b[?62;4;22c")).supported);
        assert!(!SixelSupport::from_reply(&reply("\x1b[?1;2c")).supported);
        assert!(!SixelSupport::from_reply(&reply("\x1b[4;1R")).supported);
    }

    #[test]
    fn failed_response_is_unsupported() {
        let response = AnsiResponse {
            raw: String::new(),
            value: None,
            error: "Request timed out.".into(),
        };
        assert_eq!(SixelSupport::from_response(&response), SixelSupport::default());

        let response = AnsiResponse {
            raw: "\x1b[?64;4c".into(),
            value: Some("64".into()),
            error: String::new(),
        };
        assert!(SixelSupport::from_response(&response).supported);
    }

    #[test]
    fn cell_size_from_window_report() {
        let s = SixelSupport::default().with_cell_size(&reply("\x1b[6;20;10t"));
        assert_eq!(s.cell_size, Some((10, 20)));
        let s = s.with_cell_size(&reply("\x1b[8;24;80t"));
        assert_eq!(s.cell_size, Some((10, 20)));
    }

    #[test]
    fn color_registers_from_graphics_report() {
        let s = SixelSupport::default().with_color_registers(&reply("\x1b[?1;0;16S"));
        assert_eq!(s.max_palette_colors, 16);
        // Error status, zero count, other items and other replies are ignored.
        for raw in ["\x1b[?1;3;0S", "\x1b[?1;0;0S", "\x1b[?2;0;640;480S", "\x1b[6;20;10t"] {
            assert_eq!(s.with_color_registers(&reply(raw)).max_palette_colors, 16, "{raw:?}");
        }
    }

    #[test]
    fn color_response_only_when_successful() {
        let ok = AnsiResponse {
            raw: "\x1b[?1;0;64S".into(),
            value: Some("1".into()),
            error: String::new(),
        };
        assert_eq!(SixelSupport::default().with_color_response(&ok).max_palette_colors, 64);
        let failed = AnsiResponse {
            raw: String::new(),
            value: None,
            error: "Request timed out.".into(),
        };
        assert_eq!(SixelSupport::default().with_color_response(&failed).max_palette_colors, 256);
    }

    #[test]
    fn encoder_palette_respects_terminal_limit() {
        let support = SixelSupport {
            supported: true,
            ..SixelSupport::default()
        }
        .with_color_registers(&reply("\x1b[?1;0;2S"));
        let mut enc = SixelEncoder::from_config(&QuantizerConfig::default(), &support);
        enc.encode(&[vec![RED, BLUE, Color::WHITE, Color::BLACK]]);
        assert!(enc.quantizer().palette().len() <= 2);
    }
}
