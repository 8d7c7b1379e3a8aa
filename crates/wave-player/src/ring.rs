//! Bounded ring of interleaved `f32` frames feeding the output stream.
//!
//! The engine thread fills the ring on its tick; the output callback
//! drains it without blocking. Free space, buffered depth (the delay
//! between what was queued and what is audible), flush/re-arm, and the
//! starvation flag are the knobs the transport state machine works with.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct FrameRing {
    channels: usize,
    capacity_frames: usize,
    inner: Mutex<VecDeque<f32>>,
    starved: AtomicBool,
}

impl FrameRing {
    pub(crate) fn new(channels: usize, capacity_frames: usize) -> Self {
        FrameRing {
            channels,
            capacity_frames,
            inner: Mutex::new(VecDeque::with_capacity(capacity_frames * channels)),
            starved: AtomicBool::new(false),
        }
    }

    pub(crate) fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Frames queued but not yet handed to the device.
    pub(crate) fn buffered_frames(&self) -> usize {
        self.inner.lock().unwrap().len() / self.channels
    }

    /// Frames that can currently be written without exceeding capacity.
    pub(crate) fn free_frames(&self) -> usize {
        self.capacity_frames - self.buffered_frames()
    }

    /// Append interleaved samples (a whole number of frames).
    pub(crate) fn push(&self, samples: &[f32]) {
        debug_assert_eq!(samples.len() % self.channels, 0);
        self.inner.lock().unwrap().extend(samples.iter().copied());
    }

    /// Pop up to `out.len()` samples; returns how many were written.
    ///
    /// Never blocks; the caller fills the remainder with silence.
    pub(crate) fn drain_into(&self, out: &mut [f32]) -> usize {
        let mut queue = self.inner.lock().unwrap();
        let n = out.len().min(queue.len());
        for slot in out.iter_mut().take(n) {
            *slot = queue.pop_front().unwrap();
        }
        n
    }

    /// Flush all queued frames and reset the starvation flag.
    pub(crate) fn rearm(&self) {
        self.inner.lock().unwrap().clear();
        self.starved.store(false, Ordering::Relaxed);
    }

    pub(crate) fn mark_starved(&self) {
        self.starved.store(true, Ordering::Relaxed);
    }

    /// Read and clear the starvation flag.
    pub(crate) fn take_starved(&self) -> bool {
        self.starved.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_free_and_buffered_frames() {
        let ring = FrameRing::new(2, 8);
        assert_eq!(ring.free_frames(), 8);
        ring.push(&[0.0; 6]);
        assert_eq!(ring.buffered_frames(), 3);
        assert_eq!(ring.free_frames(), 5);
    }

    #[test]
    fn drains_in_fifo_order_and_reports_shortfall() {
        let ring = FrameRing::new(1, 8);
        ring.push(&[1.0, 2.0, 3.0]);
        let mut out = [0.0; 5];
        assert_eq!(ring.drain_into(&mut out), 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(ring.buffered_frames(), 0);
    }

    #[test]
    fn rearm_flushes_and_clears_starvation() {
        let ring = FrameRing::new(2, 8);
        ring.push(&[0.5; 4]);
        ring.mark_starved();
        ring.rearm();
        assert_eq!(ring.buffered_frames(), 0);
        assert!(!ring.take_starved());
    }

    #[test]
    fn starvation_flag_is_consumed_on_read() {
        let ring = FrameRing::new(1, 4);
        ring.mark_starved();
        assert!(ring.take_starved());
        assert!(!ring.take_starved());
    }
}
