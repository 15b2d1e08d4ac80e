// SPDX-License-Identifier: MIT
//! Quantizer configuration.
//!
//! Plain serde data so it can sit in the application's TOML file next to
//! the driver settings:
//!
//! ```toml
//! [palette]
//! max_colors = 16
//! distance = "cie94"
//! builder = "popularity"
//! threshold = 12.0
//! cache_capacity = 65536
//! ```

use serde::{Deserialize, Serialize};
use tessera_term::color::Color;

use crate::distance::{Cie76, Cie94, ColorDistance, Euclidean};
use crate::kmeans::KMeans;
use crate::median_cut::MedianCut;
use crate::popularity::PopularityPalette;
use crate::PaletteBuilder;

/// Which distance metric to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    #[default]
    Euclidean,
    Cie76,
    Cie94,
}

impl ColorDistance for DistanceKind {
    fn distance(&self, a: Color, b: Color) -> f64 {
        match self {
            Self::Euclidean => Euclidean.distance(a, b),
            Self::Cie76 => Cie76.distance(a, b),
            Self::Cie94 => Cie94.distance(a, b),
        }
    }
}

/// Which palette builder to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderKind {
    Popularity,
    #[default]
    MedianCut,
    KMeans,
}

/// Everything needed to put a [`ColorQuantizer`](crate::ColorQuantizer)
/// together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizerConfig {
    /// Palette size cap.
    pub max_colors: usize,
    /// Metric for nearest-color lookups and popularity merging.
    pub distance: DistanceKind,
    pub builder: BuilderKind,
    /// Popularity merge radius, in units of `distance`.
    pub threshold: f64,
    /// Cache entries kept before the cache is flushed. `None` is unbounded.
    pub cache_capacity: Option<usize>,
    /// K-means RNG seed.
    pub seed: Option<u64>,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            max_colors: 256,
            distance: DistanceKind::Euclidean,
            builder: BuilderKind::MedianCut,
            threshold: 10.0,
            cache_capacity: None,
            seed: None,
        }
    }
}

impl QuantizerConfig {
    /// Boxed palette builder described by this config.
    #[must_use]
    pub fn palette_builder(&self) -> Box<dyn PaletteBuilder> {
        match self.builder {
            BuilderKind::Popularity => {
                Box::new(PopularityPalette::new(Box::new(self.distance), self.threshold))
            }
            BuilderKind::MedianCut => Box::new(MedianCut),
            BuilderKind::KMeans => {
                let kmeans = KMeans::new();
                Box::new(match self.seed {
                    Some(seed) => kmeans.with_seed(seed),
                    None => kmeans,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_table_is_default() {
        let cfg: QuantizerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, QuantizerConfig::default());
    }

    #[test]
    fn names_in_toml() {
        let cfg: QuantizerConfig = toml::from_str(
            "max_colors = 16\ndistance = \"cie94\"\nbuilder = \"k-means\"\nseed = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.max_colors, 16);
        assert_eq!(cfg.distance, DistanceKind::Cie94);
        assert_eq!(cfg.builder, BuilderKind::KMeans);
        assert_eq!(cfg.seed, Some(5));
        assert_eq!(cfg.cache_capacity, None);
    }

    #[test]
    fn unknown_builder_is_rejected() {
        assert!(toml::from_str::<QuantizerConfig>("builder = \"octree\"").is_err());
    }

    #[test]
    fn distance_kind_dispatches() {
        let a = Color::new(10, 20, 30);
        let b = Color::new(200, 100, 0);
        assert!((DistanceKind::Euclidean.distance(a, b) - Euclidean.distance(a, b)).abs() < 1e-12);
        assert!((DistanceKind::Cie76.distance(a, b) - Cie76.distance(a, b)).abs() < 1e-12);
        assert!((DistanceKind::Cie94.distance(a, b) - Cie94.distance(a, b)).abs() < 1e-12);
    }

    #[test]
    fn every_builder_kind_builds() {
        let input = [Color::BLACK, Color::WHITE, Color::new(255, 0, 0)];
        for builder in [BuilderKind::Popularity, BuilderKind::MedianCut, BuilderKind::KMeans] {
            let cfg = QuantizerConfig {
                builder,
                seed: Some(1),
                ..QuantizerConfig::default()
            };
            let palette = cfg.palette_builder().build_palette(&input, 2);
            assert_eq!(palette.len(), 2, "{builder:?}");
        }
    }
}
