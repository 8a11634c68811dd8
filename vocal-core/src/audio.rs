//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library),
//! enabled with the `capture` feature. This is the thin collaborator that
//! turns device callbacks into [`AudioBuffer`]s for the analysis pipeline.
//!
//! ## Features
//! - Default input device selection
//! - Preference for 32-bit float input near 44.1 kHz
//! - Downmix of multi-channel input to mono
//! - Fixed-size buffers stamped with session time
//! - Non-blocking hand-off from the audio callback

use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};

use crate::analysis::AudioBuffer;
use crate::pipeline::{BufferSender, PushOutcome};

/// Audio buffer size for processing frames.
///
/// 2048 samples span about 46 ms at 44.1 kHz, more than two periods of the
/// lowest supported voice pitch (80 Hz).
pub const BUFFER_SIZE: usize = 2048;

/// Preferred capture sample rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Configures an `f32` stream as close to 44.1 kHz as the device allows
/// 3. Re-chunks callback data into `BUFFER_SIZE` mono buffers and pushes them
///    to the pipeline without blocking
///
/// # Arguments
/// * `sender` - Capture side of the analysis pipeline
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate;
///   capture stops when the stream is dropped
/// * `Err(e)` - No usable input device or stream
pub fn start_audio_capture(sender: BufferSender) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = cpal::SampleRate(TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    ));
    let config = supported_config.with_sample_rate(sample_rate);

    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate_val, channels);

    let err_fn = |err| warn!("An error occurred on the audio stream: {}", err);

    // Accumulates mono samples between callbacks.
    let mut pending = Vec::with_capacity(BUFFER_SIZE * 2);
    let mut samples_sent: u64 = 0;
    let rate = sample_rate_val as f32;

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            downmix_into(data, channels, &mut pending);

            while pending.len() >= BUFFER_SIZE {
                let samples: Vec<f32> = pending.drain(..BUFFER_SIZE).collect();
                let timestamp = Duration::from_secs_f64(samples_sent as f64 / rate as f64);
                samples_sent += BUFFER_SIZE as u64;

                // The rate was validated above, so construction cannot fail here.
                if let Ok(buffer) = AudioBuffer::new(samples, rate, timestamp) {
                    if sender.push(buffer) == PushOutcome::Closed {
                        pending.clear();
                        return;
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Appends the per-frame average of interleaved `data` to `out`.
fn downmix_into(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    out.extend(
        data.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats are considered. Among those, mono is preferred,
/// then the configuration whose rate range lies closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_diff = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_diff)
        })
}
