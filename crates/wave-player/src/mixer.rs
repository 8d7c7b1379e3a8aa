//! Master volume control.
//!
//! The master gain is a single control shared with the output callback,
//! which multiplies it into every interleaved sample, so one value
//! applies uniformly to all channels. A short-lived [`Mixer`] is
//! resolved per call; once the output is gone the control can no longer
//! be found.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crate::error::PlayerError;

/// Native gain range: 0 (mute) to unity.
pub(crate) const GAIN_MAX: u32 = 1 << 16;

const MAX_PERCENT: u8 = 100;

/// Per-call accessor for the session's master gain control.
pub(crate) struct Mixer {
    master: Arc<AtomicU32>,
}

impl Mixer {
    /// Resolve the master control behind the session output.
    pub(crate) fn open(master: &Weak<AtomicU32>) -> Result<Self, PlayerError> {
        master
            .upgrade()
            .map(|master| Mixer { master })
            .ok_or(PlayerError::MixerControlNotFound)
    }

    /// Current volume, normalized from the native range into 0..=100.
    pub(crate) fn volume(&self) -> u8 {
        percent_from_native(self.master.load(Ordering::Relaxed))
    }

    /// Set the volume; values above 100 are clamped.
    pub(crate) fn set_volume(&self, percent: u8) {
        self.master
            .store(native_from_percent(percent), Ordering::Relaxed);
    }
}

fn percent_from_native(native: u32) -> u8 {
    (native as u64 * MAX_PERCENT as u64 / GAIN_MAX as u64) as u8
}

fn native_from_percent(percent: u8) -> u32 {
    percent.min(MAX_PERCENT) as u32 * GAIN_MAX / MAX_PERCENT as u32
}
