// SPDX-License-Identifier: MIT
//! K-means palette (Lloyd's algorithm in RGB).

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tessera_term::color::Color;
use tracing::trace;

use crate::{PaletteBuilder, dedup_colors};

/// Converged once no centroid moves further than this between passes.
const CONVERGENCE: f64 = 1.0;

type Point = [f64; 3];

/// K-means palette builder.
///
/// Initial centroids are distinct input colors picked at random. A cluster
/// that ends a pass empty is reseeded from a random input color. Seed the
/// builder with [`KMeans::with_seed`] to make results reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeans {
    max_iterations: usize,
    seed: Option<u64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new()
    }
}

impl KMeans {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: 100,
            seed: None,
        }
    }

    /// Fixed RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn rng(&self) -> StdRng {
        self.seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
    }
}

fn point(c: Color) -> Point {
    [f64::from(c.r), f64::from(c.g), f64::from(c.b)]
}

fn dist2(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_color(p: &Point) -> Color {
    let [r, g, b] = p.map(|v| v.round().clamp(0.0, 255.0) as u8);
    Color::new(r, g, b)
}

/// Index of the nearest centroid; lowest index wins ties.
fn nearest(p: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist2(p, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

impl PaletteBuilder for KMeans {
    fn build_palette(&self, colors: &[Color], max_colors: usize) -> Vec<Color> {
        if colors.is_empty() || max_colors == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let distinct: Vec<Color> = colors.iter().copied().filter(|c| seen.insert(*c)).collect();
        let k = max_colors.min(distinct.len());

        let mut rng = self.rng();
        let mut centroids: Vec<Point> = distinct
            .choose_multiple(&mut rng, k)
            .map(|&c| point(c))
            .collect();
        let points: Vec<Point> = colors.iter().map(|&c| point(c)).collect();

        let mut passes = 0;
        while passes < self.max_iterations {
            passes += 1;

            let mut sums = vec![[0.0f64; 3]; k];
            let mut counts = vec![0usize; k];
            for p in &points {
                let i = nearest(p, &centroids);
                for (s, v) in sums[i].iter_mut().zip(p) {
                    *s += v;
                }
                counts[i] += 1;
            }

            let mut moved = 0.0f64;
            for (i, centroid) in centroids.iter_mut().enumerate() {
                let next = if counts[i] == 0 {
                    points[rng.random_range(0..points.len())]
                } else {
                    let n = counts[i] as f64;
                    sums[i].map(|s| s / n)
                };
                moved = moved.max(dist2(centroid, &next).sqrt());
                *centroid = next;
            }

            if moved <= CONVERGENCE {
                break;
            }
        }

        trace!(k, passes, "k-means done");
        dedup_colors(centroids.iter().map(to_color))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_blobs() -> Vec<Color> {
        let mut out = Vec::new();
        for v in 0..5u8 {
            out.push(Color::new(v, v, v));
            out.push(Color::new(255 - v, 255 - v, 255 - v));
        }
        out
    }

    #[test]
    fn defaults() {
        let k = KMeans::default();
        assert_eq!(k.max_iterations(), 100);
        assert_eq!(k, KMeans::new());
    }

    #[test]
    fn empty_input_or_zero_max() {
        let k = KMeans::new().with_seed(1);
        assert!(k.build_palette(&[], 3).is_empty());
        assert!(k.build_palette(&[Color::WHITE], 0).is_empty());
    }

    #[test]
    fn k_at_least_distinct_returns_the_inputs() {
        let input = [Color::new(255, 0, 0), Color::new(0, 0, 255), Color::new(255, 0, 0)];
        let mut out = KMeans::new().with_seed(7).build_palette(&input, 8);
        out.sort_by_key(|c| (c.r, c.g, c.b));
        assert_eq!(out, vec![Color::new(0, 0, 255), Color::new(255, 0, 0)]);
    }

    #[test]
    fn finds_two_separated_clusters() {
        let out = KMeans::new().with_seed(42).build_palette(&two_blobs(), 2);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|c| c.r < 10 && c.g < 10 && c.b < 10), "{out:?}");
        assert!(out.iter().any(|c| c.r > 245 && c.g > 245 && c.b > 245), "{out:?}");
    }

    #[test]
    fn same_seed_same_palette() {
        let input: Vec<Color> = (0..=255u8).map(|v| Color::new(v, v / 3, 255 - v)).collect();
        let a = KMeans::new().with_seed(3).build_palette(&input, 6);
        let b = KMeans::new().with_seed(3).build_palette(&input, 6);
        assert_eq!(a, b);
        assert!(a.len() <= 6);
    }

    #[test]
    fn zero_iterations_keeps_initial_centroids() {
        let input = two_blobs();
        let out = KMeans::new()
            .with_seed(9)
            .with_max_iterations(0)
            .build_palette(&input, 3);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| input.contains(c)));
    }

    #[test]
    fn nearest_prefers_lower_index_on_ties() {
        let centroids = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(nearest(&[1.0, 0.0, 0.0], &centroids), 0);
        assert_eq!(nearest(&[1.5, 0.0, 0.0], &centroids), 1);
    }
}
