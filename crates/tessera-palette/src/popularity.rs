// SPDX-License-Identifier: MIT
//! Popularity palette with a merge threshold.
//!
//! Counts exact colors, greedily folds near-duplicates together, and keeps
//! the most frequent. The merge is first-match, in first-seen order: a
//! color joins the first existing bucket within `threshold`, not the
//! closest one. Results depend on input order; that is accepted in exchange
//! for a single linear pass.

use std::collections::HashMap;

use tessera_term::color::Color;
use tracing::trace;

use crate::PaletteBuilder;
use crate::distance::ColorDistance;

/// Most-frequent-colors palette.
pub struct PopularityPalette {
    distance: Box<dyn ColorDistance>,
    threshold: f64,
}

impl PopularityPalette {
    /// Builder merging colors closer than `threshold` under `distance`.
    #[must_use]
    pub fn new(distance: Box<dyn ColorDistance>, threshold: f64) -> Self {
        Self {
            distance,
            threshold,
        }
    }

    /// Merge threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl std::fmt::Debug for PopularityPalette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopularityPalette")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Exact-color counts in first-seen order.
fn histogram(colors: &[Color]) -> Vec<(Color, usize)> {
    let mut slots: HashMap<Color, usize> = HashMap::new();
    let mut hist: Vec<(Color, usize)> = Vec::new();
    for &c in colors {
        match slots.get(&c) {
            Some(&i) => hist[i].1 += 1,
            None => {
                slots.insert(c, hist.len());
                hist.push((c, 1));
            }
        }
    }
    hist
}

impl PaletteBuilder for PopularityPalette {
    fn build_palette(&self, colors: &[Color], max_colors: usize) -> Vec<Color> {
        if colors.is_empty() || max_colors == 0 {
            return Vec::new();
        }

        let hist = histogram(colors);
        if hist.len() <= max_colors {
            return hist.into_iter().map(|(c, _)| c).collect();
        }

        let mut buckets: Vec<(Color, usize)> = Vec::with_capacity(max_colors);
        for (color, count) in hist {
            if buckets.len() >= max_colors {
                break;
            }
            let home = buckets
                .iter_mut()
                .find(|(kept, _)| self.distance.distance(*kept, color) <= self.threshold);
            match home {
                Some(bucket) => bucket.1 += count,
                None => buckets.push((color, count)),
            }
        }

        // Stable: equal counts keep first-seen order.
        buckets.sort_by(|a, b| b.1.cmp(&a.1));
        trace!(buckets = buckets.len(), "popularity palette built");
        buckets.into_iter().take(max_colors).map(|(c, _)| c).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Euclidean;
    use pretty_assertions::assert_eq;

    const RED: Color = Color::new(255, 0, 0);
    const GREEN: Color = Color::new(0, 255, 0);
    const BLUE: Color = Color::new(0, 0, 255);

    fn builder(threshold: f64) -> PopularityPalette {
        PopularityPalette::new(Box::new(Euclidean), threshold)
    }

    #[test]
    fn empty_input_or_zero_max() {
        assert!(builder(0.0).build_palette(&[], 4).is_empty());
        assert!(builder(0.0).build_palette(&[RED], 0).is_empty());
    }

    #[test]
    fn few_colors_come_back_as_is() {
        let out = builder(0.0).build_palette(&[RED, BLUE, RED, GREEN], 3);
        assert_eq!(out, vec![RED, BLUE, GREEN]);
    }

    #[test]
    fn most_frequent_first() {
        let input = [BLUE, RED, RED, RED, GREEN, GREEN, Color::WHITE];
        let out = builder(0.0).build_palette(&input, 2);
        // Green is never visited: the buckets fill with blue and red first.
        assert_eq!(out, vec![RED, BLUE]);
    }

    #[test]
    fn near_colors_merge_into_first_bucket() {
        let dark_red = Color::new(250, 0, 0);
        let input = [RED, dark_red, dark_red, BLUE, GREEN];
        let out = builder(10.0).build_palette(&input, 2);
        // Both dark red hits land in red's bucket.
        assert_eq!(out[0], RED);
        assert_eq!(out.len(), 2);
        assert!(!out.contains(&dark_red));
    }

    #[test]
    fn merging_stops_once_full() {
        let input = [RED, GREEN, BLUE, BLUE, BLUE];
        // Buckets fill with red and green; blue is never visited.
        let out = builder(0.0).build_palette(&input, 2);
        assert_eq!(out, vec![RED, GREEN]);
    }

    #[test]
    fn histogram_counts_in_first_seen_order() {
        let h = histogram(&[BLUE, RED, BLUE]);
        assert_eq!(h, vec![(BLUE, 2), (RED, 1)]);
    }
}
