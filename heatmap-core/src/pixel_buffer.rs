//! # Pixel Buffer Module
//!
//! A fixed-size, row-major RGBA8 image. Used both for the one-pixel-wide
//! spectrum columns and for the persistent scrolling texture.

use crate::color::Rgb8;
use thiserror::Error;

const BYTES_PER_PIXEL: usize = 4;

/// Errors raised by [`PixelBuffer`] construction and access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelBufferError {
    #[error("pixel buffer dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("pixel buffer of {width}x{height} does not fit in memory")]
    TooLarge { width: u32, height: u32 },
    #[error("could not allocate {bytes} bytes for a pixel buffer")]
    Allocation { bytes: usize },
    #[error("pixel ({x}, {y}) is outside a {width}x{height} buffer")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("column source must be 1x{expected}, got {width}x{height}")]
    ColumnShape { expected: u32, width: u32, height: u32 },
}

/// Owned RGBA8 pixels. Alpha is always written as 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Allocates a zero-initialized buffer.
    ///
    /// # Errors
    /// * [`PixelBufferError::ZeroDimension`] - width or height is zero
    /// * [`PixelBufferError::TooLarge`] - the byte size overflows `usize`
    /// * [`PixelBufferError::Allocation`] - the allocator refused the request
    pub fn new(width: u32, height: u32) -> Result<Self, PixelBufferError> {
        if width == 0 || height == 0 {
            return Err(PixelBufferError::ZeroDimension { width, height });
        }
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(PixelBufferError::TooLarge { width, height })?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| PixelBufferError::Allocation { bytes })?;
        data.resize(bytes, 0);

        Ok(Self { data, width, height })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
        } else {
            None
        }
    }

    fn out_of_bounds(&self, x: u32, y: u32) -> PixelBufferError {
        PixelBufferError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }

    /// Writes one opaque pixel.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb8) -> Result<(), PixelBufferError> {
        let offset = self.offset(x, y).ok_or_else(|| self.out_of_bounds(x, y))?;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color.to_rgba());
        Ok(())
    }

    /// Reads one pixel as RGBA bytes.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let mut px = [0; BYTES_PER_PIXEL];
        px.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Rgb8) {
        let rgba = color.to_rgba();
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Copies a `1 x height` column buffer into column `dst_x` of this buffer.
    pub fn copy_column_from(&mut self, dst_x: u32, column: &PixelBuffer) -> Result<(), PixelBufferError> {
        if column.width != 1 || column.height != self.height {
            return Err(PixelBufferError::ColumnShape {
                expected: self.height,
                width: column.width,
                height: column.height,
            });
        }
        if dst_x >= self.width {
            return Err(self.out_of_bounds(dst_x, 0));
        }

        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = dst_x as usize * BYTES_PER_PIXEL;
        for (row, src) in self
            .data
            .chunks_exact_mut(stride)
            .zip(column.data.chunks_exact(BYTES_PER_PIXEL))
        {
            row[start..start + BYTES_PER_PIXEL].copy_from_slice(src);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = PixelBuffer::new(3, 2).unwrap();
        assert_eq!(buf.as_bytes().len(), 3 * 2 * 4);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn fill_sets_every_pixel_opaque() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        buf.fill(Rgb8::new(10, 20, 30));
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(buf.pixel(x, y), Some([10, 20, 30, 255]));
            }
        }
    }

    #[test]
    fn set_pixel_writes_row_major() {
        let mut buf = PixelBuffer::new(3, 2).unwrap();
        buf.set_pixel(2, 1, Rgb8::new(1, 2, 3)).unwrap();
        let offset = (3 + 2) * 4; // row 1 of a 3-wide buffer, column 2
        assert_eq!(&buf.as_bytes()[offset..offset + 4], &[1, 2, 3, 255]);
        assert_eq!(buf.as_bytes().iter().filter(|&&b| b != 0).count(), 4);
    }

    #[test]
    fn out_of_bounds_writes_are_rejected_without_side_effects() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let before = buf.clone();
        assert_eq!(
            buf.set_pixel(2, 0, Rgb8::WHITE),
            Err(PixelBufferError::OutOfBounds { x: 2, y: 0, width: 2, height: 2 })
        );
        assert!(buf.set_pixel(0, 2, Rgb8::WHITE).is_err());
        assert!(buf.set_pixel(u32::MAX, u32::MAX, Rgb8::WHITE).is_err());
        assert_eq!(buf, before);
        assert_eq!(buf.pixel(5, 5), None);
    }

    #[test]
    fn zero_dimensions_fail_fast() {
        assert_eq!(
            PixelBuffer::new(0, 4),
            Err(PixelBufferError::ZeroDimension { width: 0, height: 4 })
        );
        assert!(PixelBuffer::new(4, 0).is_err());
    }

    #[test]
    fn copy_column_touches_only_the_target_column() {
        let mut texture = PixelBuffer::new(4, 3).unwrap();
        let mut column = PixelBuffer::new(1, 3).unwrap();
        for y in 0..3 {
            column.set_pixel(0, y, Rgb8::new(y as u8 + 1, 0, 0)).unwrap();
        }
        texture.copy_column_from(2, &column).unwrap();
        for y in 0..3 {
            for x in 0..4 {
                let expected = if x == 2 { [y as u8 + 1, 0, 0, 255] } else { [0, 0, 0, 0] };
                assert_eq!(texture.pixel(x, y), Some(expected));
            }
        }
    }

    #[test]
    fn copy_column_checks_shape_and_target() {
        let mut texture = PixelBuffer::new(4, 3).unwrap();
        let tall = PixelBuffer::new(1, 4).unwrap();
        let wide = PixelBuffer::new(2, 3).unwrap();
        let ok = PixelBuffer::new(1, 3).unwrap();
        assert!(matches!(texture.copy_column_from(0, &tall), Err(PixelBufferError::ColumnShape { .. })));
        assert!(matches!(texture.copy_column_from(0, &wide), Err(PixelBufferError::ColumnShape { .. })));
        assert!(matches!(texture.copy_column_from(4, &ok), Err(PixelBufferError::OutOfBounds { .. })));
    }
}
