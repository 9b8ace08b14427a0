//! Plain colour values and the linear blending used for growth transitions.

use serde::{Deserialize, Serialize};

/// An 8-bit RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// An 8-bit RGB colour with a floating point alpha in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub rgb: Rgb,
    pub a: f32,
}

/// A start/end colour pair interpolated by a transition ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub start: Rgb,
    pub end: Rgb,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linearly interpolates each channel towards `end`, rounding to the
    /// nearest integer.
    ///
    /// `t` is clamped to `[0, 1]`. At `t == 0` the result is exactly `self`
    /// and at `t == 1` exactly `end`: both are small integers, so the `f32`
    /// arithmetic is exact at the endpoints.
    pub fn lerp(self, end: Rgb, t: f32) -> Rgb {
        let t = clamp_unit(t);
        Rgb {
            r: lerp_channel(self.r, end.r, t),
            g: lerp_channel(self.g, end.g, t),
            b: lerp_channel(self.b, end.b, t),
        }
    }
}

impl Rgba {
    pub fn lerp(self, end: Rgba, t: f32) -> Rgba {
        let t = clamp_unit(t);
        Rgba {
            rgb: self.rgb.lerp(end.rgb, t),
            a: self.a + (end.a - self.a) * t,
        }
    }
}

impl ColorRange {
    pub fn at(&self, t: f32) -> Rgb {
        self.start.lerp(self.end, t)
    }
}

/// Clamps to `[0, 1]`, mapping NaN to `0`.
pub fn clamp_unit(t: f32) -> f32 {
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}

fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    let (a, b) = (a as f32, b as f32);
    (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_hits_endpoints_exactly() {
        let start = Rgb::new(102, 186, 91);
        let end = Rgb::new(76, 79, 70);

        assert_eq!(start.lerp(end, 0.0), start);
        assert_eq!(start.lerp(end, 1.0), end);
        // Out-of-range ratios saturate at the endpoints.
        assert_eq!(start.lerp(end, -3.0), start);
        assert_eq!(start.lerp(end, 7.5), end);
        assert_eq!(start.lerp(end, f32::NAN), start);
    }

    #[test]
    fn lerp_rounds_midpoint_per_channel() {
        let mid = Rgb::new(0, 10, 255).lerp(Rgb::new(255, 11, 0), 0.5);
        // 127.5 rounds away from zero, 10.5 likewise.
        assert_eq!(mid, Rgb::new(128, 11, 128));
    }

    #[test]
    fn rgba_interpolates_alpha() {
        let a = Rgba {
            rgb: Rgb::new(0, 0, 0),
            a: 0.8,
        };
        let b = Rgba {
            rgb: Rgb::new(100, 100, 100),
            a: 0.9,
        };
        let half = a.lerp(b, 0.5);
        assert_eq!(half.rgb, Rgb::new(50, 50, 50));
        assert!((half.a - 0.85).abs() < 1e-6);
    }
}
