// SPDX-License-Identifier: MIT
//! # tessera-palette: color distance, palettes and quantization
//!
//! Reduces arbitrary true-color content to a small palette for terminals
//! that cannot show it directly (16-color consoles, Sixel images).
//!
//! # Architecture
//!
//! ```text
//! Vec<Vec<Color>> (pixel grid)
//!     │
//!     ▼
//! PaletteBuilder:  popularity / median cut / k-means → ≤ N colors
//!     │
//!     ▼
//! ColorQuantizer:  nearest palette index per color, memoized
//!     │             (ColorDistance decides "nearest")
//!     ▼
//! sixel.rs:        palette + indices → DCS Sixel stream
//! ```
//!
//! Builders and distances are trait objects so a quantizer can be put
//! together from configuration at runtime (see [`config::QuantizerConfig`]).

// Single-char math variables are standard in color science.
#![allow(clippy::many_single_char_names)]
// Channel sums and counts become floats for averaging.
#![allow(clippy::cast_precision_loss)]
// Channel-wise names (r1/r2, dl/dc) are inherently similar.
#![allow(clippy::similar_names)]

pub mod config;
pub mod distance;
pub mod kmeans;
pub mod median_cut;
pub mod popularity;
pub mod quantizer;
pub mod sixel;

use tessera_term::color::Color;

pub use config::{BuilderKind, DistanceKind, QuantizerConfig};
pub use distance::{Cie76, Cie94, ColorDistance, Euclidean};
pub use kmeans::KMeans;
pub use median_cut::MedianCut;
pub use popularity::PopularityPalette;
pub use quantizer::ColorQuantizer;
pub use sixel::{SixelEncoder, SixelSupport};

/// Reduces a set of colors to at most `max_colors` representatives.
///
/// Every implementation returns an empty palette for empty input or
/// `max_colors == 0`, never returns duplicates, and never panics.
pub trait PaletteBuilder: Send + Sync {
    /// Build the palette.
    fn build_palette(&self, colors: &[Color], max_colors: usize) -> Vec<Color>;
}

/// Order-preserving dedup for small color lists.
pub(crate) fn dedup_colors(colors: impl IntoIterator<Item = Color>) -> Vec<Color> {
    let mut out: Vec<Color> = Vec::new();
    for c in colors {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}
