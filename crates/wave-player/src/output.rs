//! Output stream stage (CPAL callback).
//!
//! The callback drains the frame ring without blocking, applies the
//! master gain, and converts `f32` samples to the device sample format.
//! Starvation while the transport is playing is flagged for the engine
//! to recover on its next tick; the missing frames become silence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cpal::traits::DeviceTrait;

use crate::error::PlayerError;
use crate::mixer;
use crate::ring::FrameRing;

/// Shared state wired into the output callback.
pub(crate) struct OutputHooks {
    pub(crate) ring: Arc<FrameRing>,
    pub(crate) gain: Arc<AtomicU32>,
    pub(crate) playing: Arc<AtomicBool>,
}

/// Build an output stream that plays interleaved `f32` frames from the ring.
pub(crate) fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    hooks: OutputHooks,
) -> Result<cpal::Stream, PlayerError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, hooks),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, hooks),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, hooks),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, hooks),
        other => Err(PlayerError::Device(format!(
            "unsupported output sample format: {other:?}"
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    hooks: OutputHooks,
) -> Result<cpal::Stream, PlayerError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let OutputHooks {
        ring,
        gain,
        playing,
    } = hooks;

    let err_fn = |err| tracing::warn!("output stream error: {err}");
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                scratch.resize(data.len(), 0.0);
                let got = ring.drain_into(&mut scratch[..data.len()]);
                let gain = gain.load(Ordering::Relaxed) as f32 / mixer::GAIN_MAX as f32;

                for (slot, sample) in data.iter_mut().zip(&scratch[..got]) {
                    *slot = <T as cpal::Sample>::from_sample::<f32>(sample * gain);
                }
                for slot in data.iter_mut().skip(got) {
                    *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
                }

                // Silence while paused is expected; only a shortfall during
                // playback counts as an underrun.
                if got < data.len() && playing.load(Ordering::Relaxed) {
                    ring.mark_starved();
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| PlayerError::Device(e.to_string()))?;

    Ok(stream)
}
