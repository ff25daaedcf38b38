//! # Scrolling Compositor Module
//!
//! Owns the persistent heatmap texture and the scroll cursor. Columns are
//! written at the cursor, which then advances and wraps, so the texture is a
//! circular buffer of the most recent `width` spectrum samples.
//!
//! The compositor lives on the rendering context only; nothing here is
//! shared across threads.

use crate::color::Rgb8;
use crate::handoff::Column;
use crate::pixel_buffer::{PixelBuffer, PixelBufferError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which way the write cursor walks through the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    /// Cursor starts at column 0 and counts up.
    #[default]
    Forward,
    /// Cursor starts at the last column and counts down.
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    #[error("column {sequence} arrived after column {last}")]
    Stale { sequence: u64, last: u64 },
    #[error(transparent)]
    Buffer(#[from] PixelBufferError),
}

#[derive(Debug)]
pub struct ScrollingCompositor {
    texture: PixelBuffer,
    cursor: u32,
    direction: ScrollDirection,
    applied: u64,
    last_sequence: Option<u64>,
}

impl ScrollingCompositor {
    /// Allocates a black `width x bands` texture.
    pub fn new(width: u32, bands: u32, direction: ScrollDirection) -> Result<Self, PixelBufferError> {
        let mut texture = PixelBuffer::new(width, bands)?;
        texture.fill(Rgb8::BLACK);
        Ok(Self {
            texture,
            cursor: Self::start_cursor(width, direction),
            direction,
            applied: 0,
            last_sequence: None,
        })
    }

    fn start_cursor(width: u32, direction: ScrollDirection) -> u32 {
        match direction {
            ScrollDirection::Forward => 0,
            ScrollDirection::Backward => width - 1,
        }
    }

    /// Writes `column` at the cursor and advances the cursor.
    ///
    /// Returns the texture column that was written. The column buffer is
    /// dropped once copied.
    pub fn apply(&mut self, column: Column) -> Result<u32, CompositeError> {
        if let Some(last) = self.last_sequence {
            if column.sequence <= last {
                return Err(CompositeError::Stale {
                    sequence: column.sequence,
                    last,
                });
            }
        }

        let x = self.cursor;
        self.texture.copy_column_from(x, &column.pixels)?;
        self.cursor = self.next_cursor();
        self.applied += 1;
        self.last_sequence = Some(column.sequence);
        log::trace!("applied column {} at x={}", column.sequence, x);
        Ok(x)
    }

    fn next_cursor(&self) -> u32 {
        let width = self.texture.width();
        match self.direction {
            ScrollDirection::Forward => (self.cursor + 1) % width,
            ScrollDirection::Backward => self.cursor.checked_sub(1).unwrap_or(width - 1),
        }
    }

    /// Next column to be overwritten.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    /// Number of columns written since creation.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// The live texture, in storage order.
    pub fn texture(&self) -> &PixelBuffer {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn bands(&self) -> u32 {
        self.texture.height()
    }

    /// The texture rotated for presentation: oldest column on the left,
    /// newest on the right.
    pub fn unrolled_rgba(&self) -> Vec<u8> {
        let width = self.texture.width() as usize;
        let stride = width * 4;
        let cursor = self.cursor as usize;
        let mut out = Vec::with_capacity(self.texture.as_bytes().len());

        for row in self.texture.as_bytes().chunks_exact(stride) {
            match self.direction {
                ScrollDirection::Forward => {
                    // The cursor points at the oldest column.
                    out.extend_from_slice(&row[cursor * 4..]);
                    out.extend_from_slice(&row[..cursor * 4]);
                }
                ScrollDirection::Backward => {
                    for i in 0..width {
                        let src = (cursor + width - i) % width;
                        out.extend_from_slice(&row[src * 4..src * 4 + 4]);
                    }
                }
            }
        }
        out
    }
}
