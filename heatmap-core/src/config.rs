//! # Configuration Module
//!
//! Settings of one visualization instance. Deserializable so front-ends can
//! load them from a file; every field has a default.

use crate::compositor::ScrollDirection;
use crate::gradient::{Gradient, GradientError, HEATMAP_STOPS, StopSpec};
use crate::handoff::QueueBound;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scroll period of the default texture, in columns.
pub const DEFAULT_WIDTH: u32 = 1000;
/// Spectrum bands, i.e. texture rows.
pub const DEFAULT_BANDS: u32 = 500;
/// Lower edge of the default normalization window, in dB.
pub const DEFAULT_MIN_DB: f64 = -80.0;
/// Upper edge of the default normalization window, in dB.
pub const DEFAULT_MAX_DB: f64 = -20.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("texture width and band count must be non-zero (got {width}x{bands})")]
    ZeroDimension { width: u32, bands: u32 },
    #[error("gain must be finite and positive (got {0})")]
    InvalidGain(f32),
    #[error("min_db ({min}) must be below max_db ({max})")]
    InvalidWindow { min: f64, max: f64 },
    #[error("a bounded column queue needs a capacity of at least 1")]
    ZeroCapacity,
    #[error("invalid gradient: {0}")]
    Gradient(#[from] GradientError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Texture width, i.e. how many samples are visible before wrapping.
    pub width: u32,
    /// Length of every magnitude vector, i.e. texture height.
    pub bands: u32,
    /// Multiplier applied to normalized intensities before clamping.
    pub gain: f32,
    pub min_db: f64,
    pub max_db: f64,
    pub scroll: ScrollDirection,
    pub queue: QueueBound,
    pub gradient: Vec<StopSpec>,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            bands: DEFAULT_BANDS,
            gain: 1.0,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
            scroll: ScrollDirection::default(),
            queue: QueueBound::default(),
            gradient: HEATMAP_STOPS.to_vec(),
        }
    }
}

impl VisualizationConfig {
    /// Checks every field, including that the gradient can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.bands == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                bands: self.bands,
            });
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(ConfigError::InvalidGain(self.gain));
        }
        if !self.min_db.is_finite() || !self.max_db.is_finite() || self.min_db >= self.max_db {
            return Err(ConfigError::InvalidWindow {
                min: self.min_db,
                max: self.max_db,
            });
        }
        if self.queue == (QueueBound::Bounded { capacity: 0 }) {
            return Err(ConfigError::ZeroCapacity);
        }
        self.build_gradient()?;
        Ok(())
    }

    pub fn build_gradient(&self) -> Result<Gradient, GradientError> {
        Gradient::from_specs(&self.gradient)
    }
}
