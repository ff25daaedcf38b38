//! # Visualization Pipeline Module
//!
//! Ties the pieces together into one producer/consumer pipeline per
//! visualization instance:
//!
//! ```text
//! producer thread                         rendering context
//! ---------------                         -----------------
//! PendingFeeder::wait_ready()  <-- ready --  RenderEndpoint::initialize()
//! SpectrumFeeder::feed()       -- column -->  RenderContext::drain()
//!                                              ScrollingCompositor::apply()
//! ```
//!
//! The producer blocks once, at startup, until the renderer has built its
//! texture and gradient. After that `feed` never blocks: it computes the
//! column, tags it with a sequence number and enqueues it. The renderer
//! drains the queue on its own schedule (once per frame) in FIFO order.
//!
//! Lifecycle: `Uninitialized -> Ready -> Running -> Stopped`, held in an
//! atomic shared by both halves.

use crate::column::{ColumnError, NormalizationWindow, spectrum_to_column};
use crate::compositor::{CompositeError, ScrollingCompositor};
use crate::config::{ConfigError, VisualizationConfig};
use crate::gradient::{Gradient, GradientError};
use crate::handoff::{
    self, Column, ColumnReceiver, ColumnSender, ReadySignal, ReadyWait, SendOutcome,
};
use crate::pixel_buffer::PixelBufferError;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Called at most once, when the rendering side stops.
pub type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("could not build the gradient: {0}")]
    Gradient(#[from] GradientError),
    #[error("could not allocate the texture: {0}")]
    Texture(#[from] PixelBufferError),
    #[error("the renderer went away before it was ready")]
    RendererGone,
    #[error("could not spawn the render thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("expected {expected} magnitudes, got {got}")]
    BandMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Column(#[from] ColumnError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Uninitialized = 0,
    Ready = 1,
    Running = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Uninitialized,
            1 => PipelineState::Ready,
            2 => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Columns handed to the queue while the pipeline was live.
    pub submitted: u64,
    /// Columns written into the texture.
    pub applied: u64,
    /// Submitted columns that were thrown away instead of applied: still
    /// queued at stop, sent while the queue closed, or out of order.
    pub discarded: u64,
    /// Columns evicted by a bounded queue.
    pub overflowed: u64,
    /// Spectra fed after the pipeline had stopped; never submitted.
    pub rejected: u64,
}

impl PipelineStats {
    /// Columns still owed an outcome. Zero once both sides are quiet:
    /// every submitted column is applied, discarded or overflowed.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.applied + self.discarded + self.overflowed)
    }
}

#[derive(Debug)]
struct PipelineShared {
    state: AtomicU8,
    submitted: AtomicU64,
    applied: AtomicU64,
    discarded: AtomicU64,
    overflowed: AtomicU64,
    rejected: AtomicU64,
}

impl PipelineShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Uninitialized as u8),
            submitted: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            overflowed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `from -> to`; returns false if the state was something else.
    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn stop(&self) -> PipelineState {
        PipelineState::from_u8(self.state.swap(PipelineState::Stopped as u8, Ordering::AcqRel))
    }

    fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of a pipeline's state and counters, usable from any thread.
#[derive(Debug, Clone)]
pub struct PipelineMonitor {
    shared: Arc<PipelineShared>,
}

impl PipelineMonitor {
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats()
    }
}

/// Creates both halves of a pipeline.
///
/// The returned [`RenderEndpoint`] must be initialized on the rendering
/// context; the [`PendingFeeder`] goes to the producer thread.
pub fn channel<F>(
    config: VisualizationConfig,
    on_shutdown: F,
) -> Result<(PendingFeeder, RenderEndpoint), VisualizationError>
where
    F: FnOnce() + Send + 'static,
{
    config.validate()?;

    let shared = Arc::new(PipelineShared::new());
    let (signal, wait) = handoff::rendezvous();
    let (tx, rx) = handoff::column_queue(config.queue);

    let pending = PendingFeeder {
        wait,
        tx,
        shared: Arc::clone(&shared),
        bands: config.bands as usize,
        gain: config.gain,
    };
    let endpoint = RenderEndpoint {
        config,
        signal,
        rx,
        shared,
        on_shutdown: Some(Box::new(on_shutdown)),
    };
    Ok((pending, endpoint))
}

/// Spawns a render thread running `render(endpoint)` and blocks until that
/// thread has initialized the pipeline.
///
/// `render` is expected to call [`RenderEndpoint::initialize`] and then drive
/// the returned [`RenderContext`], e.g. with [`RenderContext::run_until`].
pub fn launch<F, R>(
    config: VisualizationConfig,
    on_shutdown: F,
    render: R,
) -> Result<(SpectrumFeeder, JoinHandle<()>), VisualizationError>
where
    F: FnOnce() + Send + 'static,
    R: FnOnce(RenderEndpoint) + Send + 'static,
{
    let (pending, endpoint) = channel(config, on_shutdown)?;
    let handle = thread::Builder::new()
        .name("visualization".into())
        .spawn(move || render(endpoint))
        .map_err(VisualizationError::Spawn)?;
    let feeder = pending.wait_ready()?;
    Ok((feeder, handle))
}

// --- Producer side ---

/// Producer half before the renderer is ready.
#[derive(Debug)]
pub struct PendingFeeder {
    wait: ReadyWait<Arc<Gradient>>,
    tx: ColumnSender,
    shared: Arc<PipelineShared>,
    bands: usize,
    gain: f32,
}

impl PendingFeeder {
    /// Blocks until the renderer is ready. There is no timeout.
    ///
    /// # Errors
    /// [`VisualizationError::RendererGone`] if the render side was dropped
    /// without initializing.
    pub fn wait_ready(self) -> Result<SpectrumFeeder, VisualizationError> {
        log::debug!("waiting for the renderer to become ready");
        let gradient = self.wait.wait().ok_or(VisualizationError::RendererGone)?;
        log::debug!("renderer ready, feeding {} bands", self.bands);
        Ok(SpectrumFeeder {
            gradient,
            tx: self.tx,
            shared: self.shared,
            bands: self.bands,
            gain: self.gain,
            next_sequence: 0,
            overflow_reported: false,
        })
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Producer half of a running pipeline.
#[derive(Debug)]
pub struct SpectrumFeeder {
    gradient: Arc<Gradient>,
    tx: ColumnSender,
    shared: Arc<PipelineShared>,
    bands: usize,
    gain: f32,
    next_sequence: u64,
    overflow_reported: bool,
}

impl SpectrumFeeder {
    /// Converts one spectrum to a column and schedules it on the renderer.
    ///
    /// Never blocks. Once the pipeline has stopped, the spectrum is discarded
    /// and `Ok(())` is returned.
    ///
    /// # Errors
    /// * [`FeedError::BandMismatch`] - `magnitudes.len()` differs from the band count
    /// * [`FeedError::Column`] - `min`/`max` do not form a usable window
    pub fn feed(&mut self, magnitudes: &[f64], min: f64, max: f64) -> Result<(), FeedError> {
        if self.shared.state() == PipelineState::Stopped {
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if magnitudes.len() != self.bands {
            return Err(FeedError::BandMismatch {
                expected: self.bands,
                got: magnitudes.len(),
            });
        }

        let window = NormalizationWindow::new(min, max)?;
        let pixels = spectrum_to_column(&self.gradient, magnitudes, window, self.gain)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(Column { sequence, pixels }) {
            SendOutcome::Queued => {}
            SendOutcome::QueuedAfterDrop(dropped) => {
                self.shared.overflowed.fetch_add(dropped as u64, Ordering::Relaxed);
                if !self.overflow_reported {
                    self.overflow_reported = true;
                    log::warn!("renderer is falling behind; dropping the oldest queued columns");
                }
            }
            SendOutcome::Disconnected => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::Reclaimed { evicted, reclaimed } => {
                self.shared.overflowed.fetch_add(evicted as u64, Ordering::Relaxed);
                self.shared.discarded.fetch_add(reclaimed as u64, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// The gradient shared with the renderer.
    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Columns waiting for the renderer.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state() == PipelineState::Stopped
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

// --- Render side ---

/// Render half before initialization. Move it to the rendering context.
pub struct RenderEndpoint {
    config: VisualizationConfig,
    signal: ReadySignal<Arc<Gradient>>,
    rx: ColumnReceiver,
    shared: Arc<PipelineShared>,
    on_shutdown: Option<ShutdownCallback>,
}

impl std::fmt::Debug for RenderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEndpoint")
            .field("config", &self.config)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl RenderEndpoint {
    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Builds the texture, gradient and cursor, then releases the producer.
    ///
    /// On failure the pipeline is stopped and the shutdown callback runs, so
    /// the producer side learns about it either way.
    pub fn initialize(mut self) -> Result<RenderContext, VisualizationError> {
        match self.build() {
            Ok((compositor, gradient)) => {
                self.shared
                    .transition(PipelineState::Uninitialized, PipelineState::Ready);
                log::info!(
                    "visualization ready: {}x{} texture, {} gradient stops",
                    compositor.width(),
                    compositor.bands(),
                    gradient.stops().len()
                );
                if !self.signal.signal(gradient) {
                    log::warn!("renderer is ready but the producer has already gone");
                }
                Ok(RenderContext {
                    compositor,
                    rx: self.rx,
                    shared: self.shared,
                    on_shutdown: self.on_shutdown,
                })
            }
            Err(e) => {
                log::error!("visualization failed to initialize: {}", e);
                self.shared.stop();
                if let Some(callback) = self.on_shutdown.take() {
                    callback();
                }
                Err(e)
            }
        }
    }

    fn build(&self) -> Result<(ScrollingCompositor, Arc<Gradient>), VisualizationError> {
        let gradient = Arc::new(self.config.build_gradient()?);
        let compositor =
            ScrollingCompositor::new(self.config.width, self.config.bands, self.config.scroll)?;
        Ok((compositor, gradient))
    }
}

/// Render half of an initialized pipeline. Owns the texture and cursor.
///
/// Dropping it stops the pipeline.
pub struct RenderContext {
    compositor: ScrollingCompositor,
    rx: ColumnReceiver,
    shared: Arc<PipelineShared>,
    on_shutdown: Option<ShutdownCallback>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("compositor", &self.compositor)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    /// Applies every queued column. Call once per frame.
    pub fn drain(&mut self) -> usize {
        self.drain_up_to(usize::MAX)
    }

    /// Applies at most `max` queued columns, oldest first.
    pub fn drain_up_to(&mut self, max: usize) -> usize {
        let mut applied = 0;
        while applied < max && !self.is_stopped() {
            let Some(column) = self.rx.try_recv() else {
                break;
            };
            if self.apply(column) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocking render loop for contexts without a frame clock: applies
    /// columns as they arrive until `shutdown` receives a message, every
    /// sender of `shutdown` is dropped, or the producer goes away. Ends with
    /// [`RenderContext::shutdown`].
    pub fn run_until(&mut self, shutdown: &Receiver<()>) {
        let columns = self.rx.as_receiver().clone();
        while !self.is_stopped() {
            crossbeam_channel::select! {
                recv(columns) -> msg => match msg {
                    Ok(column) => {
                        self.apply(column);
                    }
                    Err(_) => {
                        log::info!("producer disconnected, stopping renderer");
                        break;
                    }
                },
                recv(shutdown) -> msg => {
                    match msg {
                        Ok(()) => log::info!("received shutdown signal"),
                        Err(_) => log::info!("shutdown channel closed, stopping renderer"),
                    }
                    break;
                },
            }
        }
        self.shutdown();
    }

    fn apply(&mut self, column: Column) -> bool {
        match self.compositor.apply(column) {
            Ok(_) => {
                self.shared.applied.fetch_add(1, Ordering::Relaxed);
                if self
                    .shared
                    .transition(PipelineState::Ready, PipelineState::Running)
                {
                    log::info!("first column received, visualization running");
                }
                true
            }
            Err(CompositeError::Stale { sequence, last }) => {
                log::error!("dropping out-of-order column {} (last applied {})", sequence, last);
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(CompositeError::Buffer(e)) => {
                log::error!("cannot composite column: {}", e);
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                self.shutdown();
                false
            }
        }
    }

    /// Stops the pipeline: later feeds are discarded, queued columns are
    /// released, and the shutdown callback runs (at most once).
    pub fn shutdown(&mut self) {
        if self.shared.stop() == PipelineState::Stopped {
            return;
        }
        let flushed = self.rx.close();
        self.shared.discarded.fetch_add(flushed as u64, Ordering::Relaxed);
        log::info!(
            "visualization stopped after {} columns ({} queued columns discarded)",
            self.compositor.applied(),
            flushed
        );
        if let Some(callback) = self.on_shutdown.take() {
            callback();
        }
    }

    pub fn compositor(&self) -> &ScrollingCompositor {
        &self.compositor
    }

    /// Columns waiting to be applied.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PipelineState::Stopped
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
