//! # Color Module
//!
//! Display-encoded and linear-light color types, and the gamma transfer
//! between them.
//!
//! Screens expect gamma-encoded values, but blending two colors only looks
//! right when done on values proportional to physical light. Everything that
//! mixes colors in this crate therefore decodes to [`LinearRgb`] first and
//! encodes back to [`Rgb8`] at the very end.

use serde::{Deserialize, Serialize};

/// Display gamma used for both decoding and encoding.
pub const GAMMA: f32 = 2.2;

/// An 8-bit, gamma-encoded RGB color as sent to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Rgb8 = Rgb8::new(0, 0, 0);
    pub const WHITE: Rgb8 = Rgb8::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decodes this color into linear light.
    pub fn to_linear(self) -> LinearRgb {
        LinearRgb {
            r: decode_channel(self.r),
            g: decode_channel(self.g),
            b: decode_channel(self.b),
        }
    }

    /// RGBA bytes with a fully opaque alpha.
    #[inline]
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl From<[u8; 3]> for Rgb8 {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb8> for [u8; 3] {
    fn from(color: Rgb8) -> Self {
        [color.r, color.g, color.b]
    }
}

/// A color in linear light, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LinearRgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Per-channel linear interpolation, `t` in `[0, 1]`.
    pub fn lerp(self, other: LinearRgb, t: f32) -> LinearRgb {
        LinearRgb {
            r: lerp(self.r, other.r, t),
            g: lerp(self.g, other.g, t),
            b: lerp(self.b, other.b, t),
        }
    }

    /// Re-encodes this color for display.
    pub fn to_display(self) -> Rgb8 {
        Rgb8 {
            r: encode_channel(self.r),
            g: encode_channel(self.g),
            b: encode_channel(self.b),
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// `(encoded / 255) ^ GAMMA`
#[inline]
pub fn decode_channel(encoded: u8) -> f32 {
    (encoded as f32 / 255.0).powf(GAMMA)
}

/// `255 * linear ^ (1 / GAMMA)`, rounded to the nearest step.
#[inline]
pub fn encode_channel(linear: f32) -> u8 {
    let linear = if linear.is_nan() { 0.0 } else { linear.clamp(0.0, 1.0) };
    (255.0 * linear.powf(1.0 / GAMMA)).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_survive_decode_and_encode() {
        assert_eq!(Rgb8::BLACK.to_linear(), LinearRgb::new(0.0, 0.0, 0.0));
        assert_eq!(Rgb8::WHITE.to_linear(), LinearRgb::new(1.0, 1.0, 1.0));
        assert_eq!(Rgb8::BLACK.to_linear().to_display(), Rgb8::BLACK);
        assert_eq!(Rgb8::WHITE.to_linear().to_display(), Rgb8::WHITE);
    }

    #[test]
    fn every_channel_value_is_recovered_after_decoding() {
        for v in 0..=255u8 {
            assert_eq!(encode_channel(decode_channel(v)), v, "value {v}");
        }
    }

    #[test]
    fn half_linear_light_is_brighter_than_half_code_value() {
        // 0.5 ^ (1/2.2) * 255 = 186.08
        assert_eq!(encode_channel(0.5), 186);
        assert!(decode_channel(128) < 0.25);
    }

    #[test]
    fn encode_clamps_out_of_range_values() {
        assert_eq!(encode_channel(-1.0), 0);
        assert_eq!(encode_channel(2.0), 255);
        assert_eq!(encode_channel(f32::NAN), 0);
    }
}
