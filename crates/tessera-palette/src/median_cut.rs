// SPDX-License-Identifier: MIT
//! Median-cut palette.
//!
//! Starts with one cube holding every input color and keeps cutting the
//! largest-volume cube in two along its widest channel, at the median,
//! until there are `max_colors` cubes or nothing left to cut. Each cube
//! contributes its average color.

use tessera_term::color::Color;
use tracing::trace;

use crate::{PaletteBuilder, dedup_colors};

/// Median-cut palette builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedianCut;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    const fn of(self, c: Color) -> u8 {
        match self {
            Self::Red => c.r,
            Self::Green => c.g,
            Self::Blue => c.b,
        }
    }
}

// ---------------------------------------------------------------------------
// Cube geometry
// ---------------------------------------------------------------------------

/// Per-channel (min, max) of a non-empty cube.
fn bounds(cube: &[Color]) -> [(u8, u8); 3] {
    let mut out = [(u8::MAX, u8::MIN); 3];
    for &c in cube {
        for (slot, v) in out.iter_mut().zip([c.r, c.g, c.b]) {
            slot.0 = slot.0.min(v);
            slot.1 = slot.1.max(v);
        }
    }
    out
}

fn volume(cube: &[Color]) -> u32 {
    bounds(cube)
        .iter()
        .map(|&(lo, hi)| u32::from(hi - lo) + 1)
        .product()
}

/// Widest channel; ties go red, then green, then blue.
fn widest(cube: &[Color]) -> Channel {
    let [r, g, b] = bounds(cube).map(|(lo, hi)| hi - lo);
    if r >= g && r >= b {
        Channel::Red
    } else if g >= b {
        Channel::Green
    } else {
        Channel::Blue
    }
}

fn splittable(cube: &[Color]) -> bool {
    cube.first()
        .is_some_and(|&first| cube.iter().any(|&c| c != first))
}

fn average(cube: &[Color]) -> Color {
    let n = cube.len() as u64;
    let mut sum = [0u64; 3];
    for c in cube {
        sum[0] += u64::from(c.r);
        sum[1] += u64::from(c.g);
        sum[2] += u64::from(c.b);
    }
    // Rounded mean of u8 values always fits in u8.
    let [r, g, b] = sum.map(|s| u8::try_from((s + n / 2) / n).unwrap_or(u8::MAX));
    Color::new(r, g, b)
}

/// Cut `cube` at the median of its widest channel.
///
/// The cut lands on a value boundary so equal channel values never end up
/// on both sides. Hands the cube back untouched if no boundary exists.
fn split(mut cube: Vec<Color>) -> Result<(Vec<Color>, Vec<Color>), Vec<Color>> {
    let channel = widest(&cube);
    cube.sort_by_key(|&c| channel.of(c));
    let median = channel.of(cube[cube.len() / 2]);
    let mut cut = cube.partition_point(|&c| channel.of(c) < median);
    if cut == 0 {
        cut = cube.partition_point(|&c| channel.of(c) <= median);
    }
    if cut == 0 || cut == cube.len() {
        return Err(cube);
    }
    let upper = cube.split_off(cut);
    Ok((cube, upper))
}

impl PaletteBuilder for MedianCut {
    fn build_palette(&self, colors: &[Color], max_colors: usize) -> Vec<Color> {
        if colors.is_empty() || max_colors == 0 {
            return Vec::new();
        }

        let mut cubes: Vec<Vec<Color>> = vec![colors.to_vec()];
        while cubes.len() < max_colors {
            let pick = cubes
                .iter()
                .enumerate()
                .filter(|(_, cube)| splittable(cube))
                .max_by_key(|(_, cube)| volume(cube))
                .map(|(i, _)| i);
            let Some(i) = pick else { break };

            let cube = cubes.swap_remove(i);
            match split(cube) {
                Ok((lower, upper)) => {
                    cubes.push(lower);
                    cubes.push(upper);
                }
                Err(cube) => {
                    cubes.push(cube);
                    break;
                }
            }
        }

        trace!(cubes = cubes.len(), "median cut done");
        dedup_colors(cubes.iter().map(|cube| average(cube)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
