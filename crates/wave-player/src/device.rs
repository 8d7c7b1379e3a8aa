//! Output device negotiation.
//!
//! Resolves the CPAL device and stream configuration for a decoded
//! stream: device selection by name, sample coding, channel count,
//! nearest-matching sample rate, and the ring capacity that gives the
//! engine several ticks of headroom against underrun.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::chmap::{self, Speaker};
use crate::error::PlayerError;
use crate::sample::SampleCoding;
use crate::wave::StreamInfo;

/// The ring holds this many ticks worth of audio.
const RING_HEADROOM_TICKS: u64 = 8;

/// Everything the engine needs to open the output stream.
pub(crate) struct Negotiated {
    pub(crate) device: cpal::Device,
    pub(crate) config: cpal::StreamConfig,
    pub(crate) sample_format: cpal::SampleFormat,
    pub(crate) ring_frames: usize,
    pub(crate) coding: SampleCoding,
    pub(crate) layout: Vec<Speaker>,
}

/// Configure an output for `info`, or fail with the first violated rule.
pub(crate) fn negotiate(
    info: &StreamInfo,
    device_name: Option<&str>,
    tick_ms: u32,
) -> Result<Negotiated, PlayerError> {
    let coding = SampleCoding::for_stream(info)?;

    let host = cpal::default_host();
    let device = pick_device(&host, device_name)?;
    let config = pick_output_config(&device, info.channels, info.sample_rate)?;
    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();

    // CPAL exposes no channel-map control, the same non-fatal situation
    // as a device rejecting the map; the computed layout is kept for
    // diagnostics and the interleaved order is the file's own.
    let layout = chmap::layout(info.channel_mask, info.channels);
    tracing::debug!(?layout, "speaker layout");

    Ok(Negotiated {
        device,
        config: stream_config,
        sample_format,
        ring_frames: ring_frames(info.sample_rate, tick_ms),
        coding,
        layout,
    })
}

/// Ring capacity in frames for a stream rate and tick period.
pub(crate) fn ring_frames(sample_rate: u32, tick_ms: u32) -> usize {
    (sample_rate as u64 * RING_HEADROOM_TICKS * tick_ms as u64 / 1000) as usize
}

/// Pick the first output device whose description contains `needle`
/// (case-insensitive), or the host default when no name was given.
fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device, PlayerError> {
    if let Some(needle) = needle {
        let mut devices = host
            .output_devices()
            .map_err(|e| PlayerError::Device(e.to_string()))?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.to_string(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| PlayerError::Device(format!("no output device matched: {needle}")));
    }

    host.default_output_device()
        .ok_or_else(|| PlayerError::Device("no default output device".into()))
}

/// Choose the supported config closest to the stream's rate, for the
/// stream's channel count.
fn pick_output_config(
    device: &cpal::Device,
    channels: u16,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig, PlayerError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| PlayerError::Device(e.to_string()))?;

    let mut best: Option<(u32, u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges.filter(|r| r.channels() == channels) {
        let rate = nearest_rate(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let distance = rate.abs_diff(target_rate);
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((best_distance, best_rank, _)) => {
                is_better_candidate(distance, rank, *best_distance, *best_rank)
            }
        };
        if replace {
            best = Some((distance, rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, _, config)| config).ok_or_else(|| {
        PlayerError::Device(format!("no supported output config for {channels} channels"))
    })
}

/// Clamp the target rate into a supported range.
fn nearest_rate(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max)
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(distance: u32, rank: u8, best_distance: u32, best_rank: u8) -> bool {
    if distance != best_distance {
        distance < best_distance
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_capacity_scales_with_rate_and_tick() {
        assert_eq!(ring_frames(44_100, 10), 3528);
        assert_eq!(ring_frames(8000, 25), 1600);
    }

    #[test]
    fn nearest_rate_prefers_target_when_in_range() {
        assert_eq!(nearest_rate(44_100, 96_000, 48_000), 48_000);
    }

    #[test]
    fn nearest_rate_clamps_to_range_edges() {
        assert_eq!(nearest_rate(44_100, 96_000, 22_050), 44_100);
        assert_eq!(nearest_rate(44_100, 96_000, 192_000), 96_000);
    }

    #[test]
    fn is_better_candidate_prefers_smaller_distance() {
        assert!(is_better_candidate(0, 2, 3900, 0));
        assert!(!is_better_candidate(3900, 0, 0, 2));
    }

    #[test]
    fn is_better_candidate_breaks_ties_by_format_rank() {
        assert!(is_better_candidate(0, 0, 0, 2));
        assert!(!is_better_candidate(0, 2, 0, 0));
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }
}
