// SPDX-License-Identifier: MIT
//! Color distance metrics.
//!
//! All three are symmetric, non-negative and zero for equal colors:
//!
//! - [`Euclidean`]: straight RGB distance, 0 to ≈441.67. Cheapest.
//! - [`Cie76`]: Euclidean distance in CIE L\*a\*b\* (D65). Tracks human
//!   perception much better within one color family.
//! - [`Cie94`]: CIE76 with lightness/chroma/hue weighting (graphic-arts
//!   constants).

use tessera_term::color::Color;

/// A distance between two colors.
pub trait ColorDistance: Send + Sync {
    /// Distance from `a` to `b`. Non-negative; `distance(a, b) == distance(b, a)`.
    fn distance(&self, a: Color, b: Color) -> f64;
}

// ---------------------------------------------------------------------------
// RGB
// ---------------------------------------------------------------------------

/// Euclidean distance in RGB space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl ColorDistance for Euclidean {
    fn distance(&self, a: Color, b: Color) -> f64 {
        f64::from(a.distance_squared(b)).sqrt()
    }
}

// ---------------------------------------------------------------------------
// CIE L*a*b*
// ---------------------------------------------------------------------------

/// A color in CIE L\*a\*b\* under the D65 white point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    /// Lightness, 0–100.
    pub l: f64,
    /// Green (−) to red (+).
    pub a: f64,
    /// Blue (−) to yellow (+).
    pub b: f64,
}

impl Lab {
    /// Chroma: distance from the neutral axis.
    #[must_use]
    pub fn chroma(self) -> f64 {
        self.a.hypot(self.b)
    }
}

// D65 reference white.
const XN: f64 = 0.950_47;
const YN: f64 = 1.0;
const ZN: f64 = 1.088_83;

/// Remove the sRGB transfer curve from one 0–255 channel.
#[inline]
fn srgb_to_linear(c: u8) -> f64 {
    let c = f64::from(c) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// sRGB → linear → XYZ (D65) → L\*a\*b\*.
#[must_use]
pub fn to_lab(c: Color) -> Lab {
    let r = srgb_to_linear(c.r);
    let g = srgb_to_linear(c.g);
    let b = srgb_to_linear(c.b);

    let x = 0.180_437_5f64.mul_add(b, 0.412_456_4f64.mul_add(r, 0.357_576_1 * g));
    let y = 0.072_175_0f64.mul_add(b, 0.212_672_9f64.mul_add(r, 0.715_152_2 * g));
    let z = 0.950_304_1f64.mul_add(b, 0.019_333_9f64.mul_add(r, 0.119_192_0 * g));

    let fx = lab_f(x / XN);
    let fy = lab_f(y / YN);
    let fz = lab_f(z / ZN);

    Lab {
        l: 116.0f64.mul_add(fy, -16.0),
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// CIE 1976 ΔE: Euclidean distance in L\*a\*b\*.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cie76;

impl ColorDistance for Cie76 {
    fn distance(&self, a: Color, b: Color) -> f64 {
        let p = to_lab(a);
        let q = to_lab(b);
        let dl = p.l - q.l;
        let da = p.a - q.a;
        let db = p.b - q.b;
        db.mul_add(db, dl.mul_add(dl, da * da)).sqrt()
    }
}

/// CIE 1994 ΔE, graphic-arts weights.
///
/// The formula scales chroma and hue by the first color's chroma, which
/// makes it asymmetric. Both orderings are evaluated and averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cie94;

impl Cie94 {
    const K1: f64 = 0.045;
    const K2: f64 = 0.015;

    fn one_way(p: Lab, q: Lab) -> f64 {
        let dl = p.l - q.l;
        let c1 = p.chroma();
        let c2 = q.chroma();
        let dc = c1 - c2;
        let da = p.a - q.a;
        let db = p.b - q.b;
        // Rounding can push ΔH² slightly below zero for near-neutral pairs.
        let dh2 = db.mul_add(db, da.mul_add(da, -(dc * dc))).max(0.0);

        let sc = Self::K1.mul_add(c1, 1.0);
        let sh = Self::K2.mul_add(c1, 1.0);

        let tc = dc / sc;
        dh2.mul_add(1.0 / (sh * sh), dl.mul_add(dl, tc * tc)).sqrt()
    }
}

impl ColorDistance for Cie94 {
    fn distance(&self, a: Color, b: Color) -> f64 {
        let p = to_lab(a);
        let q = to_lab(b);
        (Self::one_way(p, q) + Self::one_way(q, p)) / 2.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
