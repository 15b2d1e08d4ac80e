// SPDX-License-Identifier: MIT
//
// Properties every palette builder shares, exercised through the public API.

use std::collections::HashSet;

use tessera_palette::{
    ColorQuantizer, Euclidean, KMeans, MedianCut, PaletteBuilder, PopularityPalette,
};
use tessera_term::Color;

const RED: Color = Color::new(255, 0, 0);
const GREEN: Color = Color::new(0, 255, 0);
const BLUE: Color = Color::new(0, 0, 255);

fn builders() -> Vec<(&'static str, Box<dyn PaletteBuilder>)> {
    let mut out: Vec<(&'static str, Box<dyn PaletteBuilder>)> = Vec::new();
    out.push(("popularity", Box::new(PopularityPalette::new(Box::new(Euclidean), 0.0))));
    out.push(("popularity-merge", Box::new(PopularityPalette::new(Box::new(Euclidean), 40.0))));
    out.push(("median-cut", Box::new(MedianCut)));
    out.push(("k-means", Box::new(KMeans::new().with_seed(11))));
    out
}

fn gradient() -> Vec<Color> {
    (0..32u8)
        .flat_map(|y| (0..32u8).map(move |x| Color::new(x * 8, y * 8, 255 - x * 4)))
        .collect()
}

// ── Shared contract ──

#[test]
fn empty_input_gives_empty_palette() {
    for (name, b) in builders() {
        assert!(b.build_palette(&[], 8).is_empty(), "{name}");
    }
}

#[test]
fn zero_max_gives_empty_palette() {
    for (name, b) in builders() {
        assert!(b.build_palette(&gradient(), 0).is_empty(), "{name}");
    }
}

#[test]
fn never_more_than_max_and_never_duplicates() {
    let input = gradient();
    for (name, b) in builders() {
        for max in [1, 2, 5, 16, 100] {
            let palette = b.build_palette(&input, max);
            assert!(!palette.is_empty(), "{name} max={max}");
            assert!(palette.len() <= max, "{name} max={max}: {}", palette.len());
            let unique: HashSet<Color> = palette.iter().copied().collect();
            assert_eq!(unique.len(), palette.len(), "{name} max={max}");
        }
    }
}

// ── Specific scenarios ──

#[test]
fn popularity_keeps_small_inputs_intact() {
    let input = [BLUE, RED, BLUE, GREEN, RED, RED];
    let palette = PopularityPalette::new(Box::new(Euclidean), 0.0).build_palette(&input, 3);
    let got: HashSet<Color> = palette.into_iter().collect();
    assert_eq!(got, HashSet::from([RED, GREEN, BLUE]));
}

#[test]
fn two_by_two_grid_keeps_most_frequent() {
    let grid = vec![vec![RED, RED], vec![BLUE, GREEN]];
    let mut q = ColorQuantizer::new(
        Box::new(Euclidean),
        Box::new(PopularityPalette::new(Box::new(Euclidean), 0.0)),
    )
    .with_max_colors(2);
    let palette = q.build_palette(&grid).to_vec();
    assert_eq!(palette.len(), 2);
    assert!(palette.contains(&RED));
}

#[test]
fn median_cut_single_black() {
    assert_eq!(MedianCut.build_palette(&[Color::new(0, 0, 0)], 5), vec![Color::new(0, 0, 0)]);
}

#[test]
fn quantized_grid_indexes_into_palette() {
    let grid: Vec<Vec<Color>> = gradient().chunks(32).map(<[Color]>::to_vec).collect();
    let mut q = ColorQuantizer::new(Box::new(Euclidean), Box::new(MedianCut)).with_max_colors(16);
    let len = q.build_palette(&grid).len();
    let indices = q.quantize(&grid).expect("palette is not empty");
    assert_eq!(indices.len(), 32);
    assert!(indices.iter().flatten().all(|&i| i < len));
    assert!(q.cache_len() <= 32 * 32);
}
