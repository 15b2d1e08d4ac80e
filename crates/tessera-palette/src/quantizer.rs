// SPDX-License-Identifier: MIT
//! Palette building plus memoized nearest-color lookup.
//!
//! [`ColorQuantizer::build_palette`] takes `&mut self`; lookups take
//! `&self` and go through a [`DashMap`], so a built quantizer can be shared
//! by reference across worker threads while a rebuild can never race them.

use dashmap::DashMap;
use tessera_term::color::Color;
use tracing::debug;

use crate::PaletteBuilder;
use crate::config::QuantizerConfig;
use crate::distance::ColorDistance;

/// Maps arbitrary colors onto a palette built from an image.
pub struct ColorQuantizer {
    distance: Box<dyn ColorDistance>,
    builder: Box<dyn PaletteBuilder>,
    max_colors: usize,
    palette: Vec<Color>,
    cache: DashMap<Color, usize>,
    cache_capacity: Option<usize>,
}

impl std::fmt::Debug for ColorQuantizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorQuantizer")
            .field("max_colors", &self.max_colors)
            .field("palette", &self.palette)
            .field("cached", &self.cache.len())
            .field("cache_capacity", &self.cache_capacity)
            .finish_non_exhaustive()
    }
}

impl ColorQuantizer {
    /// Quantizer with an empty palette and room for 256 colors.
    #[must_use]
    pub fn new(distance: Box<dyn ColorDistance>, builder: Box<dyn PaletteBuilder>) -> Self {
        Self {
            distance,
            builder,
            max_colors: 256,
            palette: Vec::new(),
            cache: DashMap::new(),
            cache_capacity: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &QuantizerConfig) -> Self {
        Self::new(Box::new(config.distance), config.palette_builder())
            .with_max_colors(config.max_colors)
            .with_cache_capacity(config.cache_capacity)
    }

    #[must_use]
    pub const fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors;
        self
    }

    /// Bound the lookup cache. When full, the next miss flushes it; a
    /// capacity of zero turns caching off.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn max_colors(&self) -> usize {
        self.max_colors
    }

    /// The current palette.
    #[must_use]
    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Rebuild the palette from every pixel of `pixels` and drop all cached
    /// lookups.
    pub fn build_palette(&mut self, pixels: &[Vec<Color>]) -> &[Color] {
        let colors: Vec<Color> = pixels.iter().flatten().copied().collect();
        self.palette = self.builder.build_palette(&colors, self.max_colors);
        self.cache.clear();
        debug!(
            pixels = colors.len(),
            palette = self.palette.len(),
            "palette rebuilt"
        );
        &self.palette
    }

    /// Use a fixed palette (the 16 named colors, say) instead of building
    /// one. Clears the cache.
    pub fn set_palette(&mut self, palette: Vec<Color>) {
        self.palette = palette;
        self.cache.clear();
    }

    /// Index of the palette entry closest to `color`; the earliest entry
    /// wins ties. `None` only when the palette is empty.
    pub fn nearest_color(&self, color: Color) -> Option<usize> {
        if self.palette.is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(&color).map(|entry| *entry) {
            return Some(hit);
        }

        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (i, &entry) in self.palette.iter().enumerate() {
            let d = self.distance.distance(color, entry);
            if d < best_d {
                best = i;
                best_d = d;
            }
        }

        match self.cache_capacity {
            Some(0) => return Some(best),
            Some(cap) if self.cache.len() >= cap => self.cache.clear(),
            _ => {}
        }
        self.cache.insert(color, best);
        Some(best)
    }

    /// The palette color itself rather than its index.
    pub fn nearest(&self, color: Color) -> Option<Color> {
        self.nearest_color(color).map(|i| self.palette[i])
    }

    /// Palette indices for a whole grid. `None` when the palette is empty.
    pub fn quantize(&self, pixels: &[Vec<Color>]) -> Option<Vec<Vec<usize>>> {
        pixels
            .iter()
            .map(|row| row.iter().map(|&c| self.nearest_color(c)).collect())
            .collect()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of memoized colors.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Euclidean;
    use crate::median_cut::MedianCut;
    use crate::popularity::PopularityPalette;
    use pretty_assertions::assert_eq;

    const RED: Color = Color::new(255, 0, 0);
    const GREEN: Color = Color::new(0, 255, 0);
    const BLUE: Color = Color::new(0, 0, 255);

    fn popularity() -> ColorQuantizer {
        ColorQuantizer::new(
            Box::new(Euclidean),
            Box::new(PopularityPalette::new(Box::new(Euclidean), 0.0)),
        )
    }

    #[test]
    fn empty_palette_has_no_nearest() {
        let q = popularity();
        assert_eq!(q.nearest_color(RED), None);
        assert_eq!(q.quantize(&[vec![RED]]), None);
        assert_eq!(q.cache_len(), 0);
    }

    #[test]
    fn lookup_is_idempotent_and_cached_once() {
        let mut q = popularity();
        q.build_palette(&[vec![RED, GREEN], vec![BLUE, BLUE]]);
        let sample = Color::new(240, 20, 10);
        let first = q.nearest_color(sample);
        assert_eq!(q.cache_len(), 1);
        let second = q.nearest_color(sample);
        assert_eq!(first, second);
        assert_eq!(q.cache_len(), 1);
        assert_eq!(q.nearest(sample), Some(RED));
    }

    #[test]
    fn first_entry_wins_ties() {
        let mut q = popularity();
        q.set_palette(vec![Color::new(0, 0, 10), Color::new(0, 0, 30)]);
        assert_eq!(q.nearest_color(Color::new(0, 0, 20)), Some(0));
    }

    #[test]
    fn rebuild_clears_cache() {
        let mut q = popularity();
        q.build_palette(&[vec![RED, GREEN]]);
        q.nearest_color(BLUE);
        assert_eq!(q.cache_len(), 1);
        q.build_palette(&[vec![BLUE]]);
        assert_eq!(q.cache_len(), 0);
        assert_eq!(q.palette(), &[BLUE]);
    }

    #[test]
    fn cache_never_exceeds_distinct_colors_seen() {
        let mut q = popularity();
        q.build_palette(&[vec![RED, GREEN, BLUE]]);
        for _ in 0..3 {
            for v in 0..10u8 {
                q.nearest_color(Color::new(v, v, v));
            }
        }
        assert_eq!(q.cache_len(), 10);
    }

    #[test]
    fn capacity_flushes_when_full() {
        let mut q = popularity().with_cache_capacity(Some(2));
        q.build_palette(&[vec![RED, BLUE]]);
        q.nearest_color(Color::new(1, 0, 0));
        q.nearest_color(Color::new(2, 0, 0));
        assert_eq!(q.cache_len(), 2);
        q.nearest_color(Color::new(3, 0, 0));
        assert_eq!(q.cache_len(), 1);
        q.clear_cache();
        assert_eq!(q.cache_len(), 0);
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let mut q = popularity().with_cache_capacity(Some(0));
        q.build_palette(&[vec![RED, BLUE]]);
        assert_eq!(q.nearest_color(Color::new(1, 0, 0)), Some(0));
        assert_eq!(q.cache_len(), 0);
        assert_eq!(q.nearest_color(Color::new(1, 0, 0)), Some(0));
        assert_eq!(q.nearest(Color::new(0, 0, 250)), Some(BLUE));
        assert_eq!(q.cache_len(), 0);
    }

    #[test]
    fn quantize_maps_every_pixel() {
        let mut q = ColorQuantizer::new(Box::new(Euclidean), Box::new(MedianCut)).with_max_colors(2);
        let grid = vec![vec![Color::BLACK, Color::new(5, 5, 5)], vec![Color::WHITE, Color::new(250, 250, 250)]];
        q.build_palette(&grid);
        let Some(indices) = q.quantize(&grid) else {
            panic!("palette should not be empty");
        };
        assert_eq!(indices[0][0], indices[0][1]);
        assert_eq!(indices[1][0], indices[1][1]);
        assert_ne!(indices[0][0], indices[1][0]);
    }

    #[test]
    fn lookups_from_many_threads() {
        let mut q = popularity();
        q.build_palette(&[vec![RED, GREEN, BLUE]]);
        let q = &q;
        std::thread::scope(|s| {
            for t in 0..4u8 {
                s.spawn(move || {
                    for v in 0..64u8 {
                        assert!(q.nearest_color(Color::new(v, t, 0)).is_some());
                    }
                });
            }
        });
        assert_eq!(q.cache_len(), 4 * 64);
    }

    #[test]
    fn from_config_applies_limits() {
        let cfg = QuantizerConfig {
            max_colors: 3,
            cache_capacity: Some(8),
            ..QuantizerConfig::default()
        };
        let q = ColorQuantizer::from_config(&cfg);
        assert_eq!(q.max_colors(), 3);
        assert!(q.palette().is_empty());
    }
}
