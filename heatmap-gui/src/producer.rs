//! # Producer Thread
//!
//! Captures audio, turns it into spectrum magnitudes and feeds them into the
//! visualization pipeline. Runs on its own thread so that neither the audio
//! callback nor the GUI ever waits on analysis.

use crate::config::AudioSettings;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use heatmap_core::analyzer::SpectrumAnalyzer;
use heatmap_core::{PendingFeeder, SpectrumFeeder, audio};
use std::thread::{self, JoinHandle};

/// Handle to the running producer thread.
#[derive(Debug)]
pub struct ProducerWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ProducerWorker {
    /// Spawns the producer thread.
    ///
    /// The thread first blocks until the renderer is ready, then starts
    /// capturing. It stops when `shutdown_rx` receives a message or the
    /// pipeline reports that it was stopped.
    pub fn spawn(
        pending: PendingFeeder,
        audio_settings: AudioSettings,
        window: (f64, f64),
        shutdown_tx: Sender<()>,
        shutdown_rx: Receiver<()>,
    ) -> std::io::Result<Self> {
        let thread_handle = thread::Builder::new()
            .name("producer".into())
            .spawn(move || {
                let feeder = match pending.wait_ready() {
                    Ok(feeder) => feeder,
                    Err(e) => {
                        log::error!("producer gave up before the renderer was ready: {}", e);
                        return;
                    }
                };
                if let Err(e) = run(feeder, &audio_settings, window, &shutdown_rx) {
                    log::error!("producer stopped: {:#}", e);
                }
            })?;
        Ok(Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Signals the thread to stop and waits for it to finish.
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("producer thread panicked");
            }
        }
    }
}

impl Drop for ProducerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut feeder: SpectrumFeeder,
    settings: &AudioSettings,
    (min_db, max_db): (f64, f64),
    shutdown_rx: &Receiver<()>,
) -> anyhow::Result<()> {
    let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let (stream, sample_rate) = audio::start_audio_capture(raw_audio_tx, settings.sample_rate)?;

    let mut analyzer = SpectrumAnalyzer::new(feeder.bands(), sample_rate, settings.interval(), min_db)?;
    log::info!(
        "analyzing {} bands every {} samples at {} Hz",
        analyzer.bands(),
        analyzer.hop(),
        sample_rate
    );

    loop {
        crossbeam_channel::select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(block) => {
                    analyzer.push(&block, |magnitudes| {
                        if let Err(e) = feeder.feed(magnitudes, min_db, max_db) {
                            log::error!("dropping spectrum: {}", e);
                        }
                    });
                    if feeder.is_stopped() {
                        log::info!("pipeline stopped, producer exiting");
                        break;
                    }
                }
                Err(_) => {
                    log::warn!("audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                log::info!("producer received shutdown signal");
                break;
            },
        }
    }

    if let Err(e) = stream.pause() {
        log::warn!("error pausing audio stream: {}", e);
    }
    drop(stream);
    Ok(())
}
