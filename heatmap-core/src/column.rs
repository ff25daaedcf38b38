//! # Spectrum Column Module
//!
//! Turns one magnitude vector into a one-pixel-wide column of heatmap colors.
//!
//! Band 0 is the lowest frequency and lands on the bottom row, so row 0 of
//! the column always holds the highest band.

use crate::gradient::Gradient;
use crate::pixel_buffer::{PixelBuffer, PixelBufferError};
use thiserror::Error;

/// Errors raised while mapping a spectrum onto a column.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColumnError {
    #[error("normalization window [{min}, {max}] is empty or not finite")]
    DegenerateWindow { min: f64, max: f64 },
    #[error("a spectrum needs at least one band")]
    Empty,
    #[error("spectrum has {0} bands, more than a column can hold")]
    TooManyBands(usize),
    #[error(transparent)]
    Buffer(#[from] PixelBufferError),
}

/// The `[min, max]` range of magnitudes mapped onto the gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationWindow {
    min: f64,
    max: f64,
}

impl NormalizationWindow {
    /// Rejects non-finite bounds and windows where `min >= max`.
    pub fn new(min: f64, max: f64) -> Result<Self, ColumnError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ColumnError::DegenerateWindow { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// `clamp(gain * max(0, magnitude - min) / (max - min), 0, 1)`.
///
/// A NaN magnitude counts as silence.
#[inline]
pub fn band_intensity(magnitude: f64, window: NormalizationWindow, gain: f32) -> f32 {
    let above_floor = (magnitude - window.min).max(0.0);
    let intensity = gain as f64 * above_floor / window.span();
    if intensity.is_nan() {
        return 0.0;
    }
    intensity.clamp(0.0, 1.0) as f32
}

/// Builds a `1 x magnitudes.len()` column, low frequencies at the bottom.
pub fn spectrum_to_column(
    gradient: &Gradient,
    magnitudes: &[f64],
    window: NormalizationWindow,
    gain: f32,
) -> Result<PixelBuffer, ColumnError> {
    let bands = u32::try_from(magnitudes.len()).map_err(|_| ColumnError::TooManyBands(magnitudes.len()))?;
    if bands == 0 {
        return Err(ColumnError::Empty);
    }

    let mut column = PixelBuffer::new(1, bands)?;
    for (band, &magnitude) in (0..bands).zip(magnitudes) {
        let intensity = band_intensity(magnitude, window, gain);
        column.set_pixel(0, bands - band - 1, gradient.evaluate(intensity))?;
    }
    Ok(column)
}
