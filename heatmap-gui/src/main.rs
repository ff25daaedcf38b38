//! # Heatmap - Scrolling Spectrum Display
//!
//! The GUI front-end of the spectrum heatmap. It owns the render side of the
//! visualization pipeline and shows the scrolling texture in a window.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application, drains columns into the texture
//! - **Producer Thread**: Audio capture, spectral analysis and `feed`
//! - **Communication**: The core crate's column queue and startup rendezvous
//! - **Updates**: 60 FPS continuous updates via subscription system

mod config;
mod producer;
mod ui;

use config::AppConfig;
use heatmap_core::visualization::{self, PipelineState, PipelineStats};
use heatmap_core::{RenderContext, VisualizationConfig};
use iced::widget::image;
use iced::{Element, Subscription, Task, Theme, window};
use producer::ProducerWorker;
use std::time::Duration;
use ui::main_display::create_main_view;

/// Interval of the render tick, roughly one frame at 60 Hz.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Main entry point for the heatmap application.
///
/// Initializes logging, loads the configuration and runs the Iced GUI.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = config::config_path();
    let config = match config::load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}; falling back to defaults", e);
            AppConfig::default()
        }
    };

    let window_size = initial_window_size(&config.visualization);

    log::info!("starting heatmap window");
    let result = iced::application("Heatmap", HeatmapApp::update, HeatmapApp::view)
        .subscription(HeatmapApp::subscription)
        .theme(HeatmapApp::theme)
        .window_size(window_size)
        .exit_on_close_request(false)
        .run_with(move || (HeatmapApp::new(config), Task::none()));
    log::info!("application finished: {:?}", result);
    result
}

/// One texel per column and band, plus room for the status bar, within
/// sensible screen limits.
fn initial_window_size(config: &VisualizationConfig) -> iced::Size {
    iced::Size::new(
        config.width.clamp(320, 1600) as f32,
        config.bands.saturating_add(40).clamp(240, 1000) as f32,
    )
}

#[derive(Debug, Clone)]
pub enum Message {
    /// Timer tick, drains the column queue.
    Tick,
    /// The user asked to close the window.
    CloseRequested(window::Id),
}

/// Data the view needs for rendering.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub image: Option<image::Handle>,
    pub state: PipelineState,
    pub stats: PipelineStats,
    pub queued: usize,
    pub shutting_down: bool,
    /// Set when the pipeline could not be started at all.
    pub error: Option<String>,
}

impl AppDisplayData {
    fn refresh(&mut self, render: &RenderContext) {
        self.state = render.state();
        self.stats = render.stats();
        self.queued = render.queued();
    }
}

struct HeatmapApp {
    producer: Option<ProducerWorker>,
    render: Option<RenderContext>,
    display_data: AppDisplayData,
}

impl HeatmapApp {
    /// Builds the pipeline, starts the producer thread and initializes the
    /// render side on the GUI thread.
    fn new(config: AppConfig) -> Self {
        let mut app = Self {
            producer: None,
            render: None,
            display_data: AppDisplayData {
                image: None,
                state: PipelineState::Uninitialized,
                stats: PipelineStats::default(),
                queued: 0,
                shutting_down: false,
                error: None,
            },
        };
        if let Err(e) = app.start_pipeline(config) {
            log::error!("failed to start the visualization: {:#}", e);
            app.display_data.error = Some(format!("{:#}", e));
        }
        app
    }

    fn start_pipeline(&mut self, config: AppConfig) -> anyhow::Result<()> {
        let AppConfig { visualization: vis, audio } = config;
        let window = (vis.min_db, vis.max_db);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let on_shutdown = {
            let shutdown_tx = shutdown_tx.clone();
            move || {
                let _ = shutdown_tx.try_send(());
            }
        };
        let (pending, endpoint) = visualization::channel(vis, on_shutdown)?;

        self.producer = Some(ProducerWorker::spawn(
            pending,
            audio,
            window,
            shutdown_tx,
            shutdown_rx,
        )?);

        let render = endpoint.initialize()?;
        self.display_data.image = Some(texture_handle(&render));
        self.display_data.refresh(&render);
        self.render = Some(render);
        Ok(())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if let Some(render) = self.render.as_mut() {
                    let applied = render.drain();
                    if applied > 0 {
                        log::trace!("applied {} columns", applied);
                        self.display_data.image = Some(texture_handle(render));
                    }
                    self.display_data.refresh(render);
                }
                Task::none()
            }
            Message::CloseRequested(id) => {
                log::info!("window {:?} close requested, shutting down", id);
                self.display_data.shutting_down = true;
                if let Some(mut render) = self.render.take() {
                    render.shutdown();
                    self.display_data.refresh(&render);
                }
                if let Some(mut producer) = self.producer.take() {
                    producer.stop();
                }
                iced::exit()
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Fires a tick every 16ms and forwards window close requests.
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(TICK_INTERVAL).map(|_| Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Snapshot of the texture with the newest column at the right edge.
fn texture_handle(render: &RenderContext) -> image::Handle {
    let compositor = render.compositor();
    image::Handle::from_rgba(compositor.width(), compositor.bands(), compositor.unrolled_rgba())
}
