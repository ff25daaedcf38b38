//! # Audio Capture Module
//!
//! Real-time audio capture using CPAL (Cross-Platform Audio Library).
//! Captured blocks are mixed down to mono and forwarded through a channel to
//! whichever thread runs the spectrum analyzer.
//!
//! ## Features
//! - Automatic default input device selection
//! - Picks the f32 configuration closest to the requested sample rate
//! - Mono downmix of multi-channel input
//! - Non-blocking hand-off from the audio callback

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel receiving mono sample blocks
/// * `target_rate` - Preferred sample rate in Hz; the closest supported rate is used
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual sample rate
/// * `Err(e)` - No device or no usable f32 configuration
pub fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    log::info!("capturing {} channel(s) at {} Hz", channels, sample_rate);

    let err_fn = |err| log::error!("an error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let block = downmix(data, channels);
            // Never block the audio callback; a full or closed channel just drops the block.
            let _ = sender.try_send(block);
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Averages interleaved frames into a mono signal.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Finds the best supported f32 input configuration for the target rate.
///
/// Mono configurations win over multi-channel ones, then the configuration
/// whose rate range comes closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (c.channels() != 1, distance)
        })
}
