// heatmap-core/src/lib.rs

//! The core logic for the scrolling spectrum heatmap.
//! This crate is responsible for color mapping, pixel buffers, and the
//! producer/consumer pipeline that streams spectrum columns into a
//! scrolling texture. It also carries the audio capture and spectral
//! analysis that feed the pipeline. It is completely headless
//! and contains no GUI code.

pub mod analyzer;
pub mod audio;
pub mod color;
pub mod column;
pub mod compositor;
pub mod config;
pub mod gradient;
pub mod handoff;
pub mod pixel_buffer;
pub mod visualization;

pub use color::{LinearRgb, Rgb8};
pub use compositor::{ScrollDirection, ScrollingCompositor};
pub use config::VisualizationConfig;
pub use gradient::{ColorStop, Gradient};
pub use pixel_buffer::PixelBuffer;
pub use visualization::{
    PendingFeeder, PipelineMonitor, PipelineState, PipelineStats, RenderContext, RenderEndpoint,
    SpectrumFeeder,
};
