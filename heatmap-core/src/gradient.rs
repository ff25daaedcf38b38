//! # Gradient Module
//!
//! Maps a normalized intensity onto a color by interpolating between an
//! ordered list of color stops.
//!
//! ## Features
//! - Interpolation in linear light, re-encoded for display afterwards
//! - Exact stop colors returned unchanged when a position hits a stop
//! - Validated construction (non-empty, finite, non-decreasing positions)
//! - Positions outside the stop domain are clamped to the first/last stop

use crate::color::{LinearRgb, Rgb8};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a [`Gradient`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradientError {
    #[error("a gradient needs at least one color stop")]
    Empty,
    #[error("color stop {index} has a non-finite position")]
    NonFinitePosition { index: usize },
    #[error("color stop {index} is positioned before the stop preceding it")]
    OutOfOrder { index: usize },
}

/// An anchor of the gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    position: f32,
    color: LinearRgb,
    display: Rgb8,
}

impl ColorStop {
    /// Builds a stop from a gamma-encoded display color.
    pub fn from_srgb(position: f32, color: Rgb8) -> Self {
        Self {
            position,
            color: color.to_linear(),
            display: color,
        }
    }

    /// Builds a stop from a color that is already in linear light.
    pub fn from_linear(position: f32, color: LinearRgb) -> Self {
        Self {
            position,
            color,
            display: color.to_display(),
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn color(&self) -> LinearRgb {
        self.color
    }
}

/// Serializable description of a stop, as found in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopSpec {
    pub position: f32,
    pub rgb: [u8; 3],
}

impl From<StopSpec> for ColorStop {
    fn from(spec: StopSpec) -> Self {
        ColorStop::from_srgb(spec.position, spec.rgb.into())
    }
}

/// Stops of the default heatmap: black, blue, cyan, yellow, white.
pub const HEATMAP_STOPS: [StopSpec; 5] = [
    StopSpec { position: 0.0, rgb: [0, 0, 0] },
    StopSpec { position: 0.2, rgb: [0, 0, 255] },
    StopSpec { position: 0.4, rgb: [0, 255, 255] },
    StopSpec { position: 0.6, rgb: [255, 255, 0] },
    StopSpec { position: 1.0, rgb: [255, 255, 255] },
];

/// An immutable, ordered set of color stops.
///
/// A `Gradient` is read-only after construction, so a single instance can be
/// shared between threads behind an `Arc` without further synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<ColorStop>,
}

impl Gradient {
    /// Validates and wraps an ordered list of stops.
    ///
    /// # Errors
    /// * [`GradientError::Empty`] - no stops were given
    /// * [`GradientError::NonFinitePosition`] - a position is NaN or infinite
    /// * [`GradientError::OutOfOrder`] - positions are not non-decreasing
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, GradientError> {
        if stops.is_empty() {
            return Err(GradientError::Empty);
        }
        for (index, stop) in stops.iter().enumerate() {
            if !stop.position.is_finite() {
                return Err(GradientError::NonFinitePosition { index });
            }
            if index > 0 && stop.position < stops[index - 1].position {
                return Err(GradientError::OutOfOrder { index });
            }
        }
        Ok(Self { stops })
    }

    /// Builds a gradient from `(position, display color)` pairs.
    pub fn from_srgb(stops: &[(f32, [u8; 3])]) -> Result<Self, GradientError> {
        Self::new(
            stops
                .iter()
                .map(|&(position, rgb)| ColorStop::from_srgb(position, rgb.into()))
                .collect(),
        )
    }

    /// Builds a gradient from configuration stop descriptions.
    pub fn from_specs(specs: &[StopSpec]) -> Result<Self, GradientError> {
        Self::new(specs.iter().copied().map(ColorStop::from).collect())
    }

    /// The default five-stop heatmap gradient.
    pub fn heatmap() -> Self {
        Self {
            stops: HEATMAP_STOPS.iter().copied().map(ColorStop::from).collect(),
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Evaluates the gradient and encodes the result for display.
    ///
    /// Positions outside `[first, last]` are clamped; NaN maps to the first stop.
    pub fn evaluate(&self, position: f32) -> Rgb8 {
        match self.locate(position) {
            Segment::Stop(stop) => stop.display,
            Segment::Between(prev, next, t) => prev.color.lerp(next.color, t).to_display(),
        }
    }

    /// Evaluates the gradient without re-encoding for display.
    pub fn evaluate_linear(&self, position: f32) -> LinearRgb {
        match self.locate(position) {
            Segment::Stop(stop) => stop.color,
            Segment::Between(prev, next, t) => prev.color.lerp(next.color, t),
        }
    }

    fn locate(&self, position: f32) -> Segment<'_> {
        let first = &self.stops[0];
        let last = &self.stops[self.stops.len() - 1];
        if position.is_nan() || position <= first.position {
            return Segment::Stop(first);
        }
        if position >= last.position {
            // Duplicate trailing positions resolve to the first of them.
            let index = self.stops.partition_point(|s| s.position < last.position);
            return Segment::Stop(&self.stops[index]);
        }

        // first.position < position < last.position, so 0 < index < len.
        let index = self.stops.partition_point(|s| s.position < position);
        let next = &self.stops[index];
        if next.position == position {
            return Segment::Stop(next);
        }
        let prev = &self.stops[index - 1];
        let t = (position - prev.position) / (next.position - prev.position);
        Segment::Between(prev, next, t.clamp(0.0, 1.0))
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self::heatmap()
    }
}

enum Segment<'a> {
    Stop(&'a ColorStop),
    Between(&'a ColorStop, &'a ColorStop, f32),
}
