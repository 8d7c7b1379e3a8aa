//! Playback engine thread and transport state machine.
//!
//! The engine owns the output stream and runs a fixed-period tick loop:
//! apply at most one pending transport command (with its rendezvous),
//! sleep one tick, then stream more audio into the ring when it is at
//! least half empty. Position and the playing/paused flags are mutated
//! only here; external callers observe them through relaxed reads.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use cpal::traits::StreamTrait;
use crossbeam_channel::Sender;

use crate::device::Negotiated;
use crate::error::PlayerError;
use crate::output::{self, OutputHooks};
use crate::ring::FrameRing;
use crate::sample::SampleCoding;
use crate::sync::SyncPoint;
use crate::wave::StreamInfo;

/// Transport command; the protocol allows one pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Play,
    Pause,
    Stop,
    Jump { target_ms: u64 },
}

/// A command in the pending slot, together with its rendezvous.
pub(crate) struct Pending {
    pub(crate) cmd: Command,
    pub(crate) ack: Sender<()>,
    pub(crate) sync: Option<SyncPoint>,
}

/// State shared between the session surface and the engine thread.
pub(crate) struct Shared {
    pub(crate) info: StreamInfo,
    pub(crate) raw: Arc<[u8]>,
    pub(crate) ring: Arc<FrameRing>,
    /// Master gain; the strong references live with the output callback.
    pub(crate) gain: Weak<AtomicU32>,
    pub(crate) playing: Arc<AtomicBool>,
    pub(crate) paused: AtomicBool,
    pub(crate) current_frame: AtomicU64,
    pub(crate) last_frame: u64,
    pub(crate) halt: AtomicBool,
    pub(crate) pending: Mutex<Option<Pending>>,
    pub(crate) last_error: Mutex<Option<PlayerError>>,
    pub(crate) tick: Duration,
}

impl Shared {
    pub(crate) fn new(
        info: StreamInfo,
        raw: Arc<[u8]>,
        ring: Arc<FrameRing>,
        gain: Weak<AtomicU32>,
        tick: Duration,
    ) -> Self {
        let last_frame = info.total_frames();
        Shared {
            info,
            raw,
            ring,
            gain,
            playing: Arc::new(AtomicBool::new(false)),
            paused: AtomicBool::new(true),
            current_frame: AtomicU64::new(0),
            last_frame,
            halt: AtomicBool::new(false),
            pending: Mutex::new(None),
            last_error: Mutex::new(None),
            tick,
        }
    }
}

pub(crate) struct Engine {
    shared: Arc<Shared>,
    coding: SampleCoding,
    scratch: Vec<f32>,
}

impl Engine {
    pub(crate) fn new(shared: Arc<Shared>, coding: SampleCoding) -> Self {
        Engine {
            shared,
            coding,
            scratch: Vec::new(),
        }
    }

    /// Thread body: open the output stream, report readiness, then tick
    /// until halted. Dropping the stream on the way out flushes and
    /// closes the device on the thread that owns it.
    pub(crate) fn run(
        mut self,
        negotiated: Negotiated,
        master: Arc<AtomicU32>,
        ready: Sender<Result<(), PlayerError>>,
    ) {
        let hooks = OutputHooks {
            ring: self.shared.ring.clone(),
            gain: master,
            playing: self.shared.playing.clone(),
        };
        let stream = match output::build_output_stream(
            &negotiated.device,
            &negotiated.config,
            negotiated.sample_format,
            hooks,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let _ = ready.send(Err(PlayerError::Device(e.to_string())));
            return;
        }
        let _ = ready.send(Ok(()));

        self.run_loop();
    }

    /// The fixed-period scheduling loop.
    pub(crate) fn run_loop(&mut self) {
        self.shared.paused.store(true, Ordering::Relaxed);
        loop {
            if self.shared.halt.load(Ordering::Relaxed) {
                return;
            }
            self.apply_pending();
            thread::sleep(self.shared.tick);
            if self.shared.paused.load(Ordering::Relaxed) {
                continue;
            }
            self.pump();
        }
    }

    /// Apply at most one pending transition and run its rendezvous.
    ///
    /// Precedence among commands is play > pause > stop > jump; the slot
    /// holds at most one at a time, so the match order is the whole
    /// story.
    pub(crate) fn apply_pending(&mut self) {
        let pending = self.shared.pending.lock().unwrap().take();
        let Some(pending) = pending else { return };
        match pending.cmd {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::Jump { target_ms } => self.jump(target_ms),
        }
        let _ = pending.ack.send(());
        if let Some(sync) = pending.sync {
            sync.signal();
        }
    }

    fn play(&mut self) {
        self.shared.playing.store(true, Ordering::Relaxed);
        self.shared.paused.store(false, Ordering::Relaxed);
        tracing::debug!("transport: playing");
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.paused.store(true, Ordering::Relaxed);

        // Frames still queued were never heard; rewind over them so the
        // resumed playback does not skip ahead.
        let delay = self.shared.ring.buffered_frames() as u64;
        let current = self.shared.current_frame.load(Ordering::Relaxed);
        self.shared
            .current_frame
            .store(current.saturating_sub(delay), Ordering::Relaxed);
        self.shared.ring.rearm();
        tracing::debug!(rewound = delay, "transport: paused");
    }

    fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.paused.store(true, Ordering::Relaxed);
        self.shared.current_frame.store(0, Ordering::Relaxed);
        self.shared.ring.rearm();
        tracing::debug!("transport: stopped");
    }

    fn jump(&mut self, target_ms: u64) {
        let frame = self
            .shared
            .info
            .frame_at_ms(target_ms)
            .min(self.shared.last_frame);
        self.shared.current_frame.store(frame, Ordering::Relaxed);
        self.shared.ring.rearm();
        tracing::debug!(target_ms, frame, "transport: jumped");
    }

    /// Stream more audio when the ring is at least half empty.
    pub(crate) fn pump(&mut self) {
        let ring = &self.shared.ring;
        let free = ring.free_frames() as u64;
        if free <= ring.capacity_frames() as u64 / 2 {
            return;
        }

        let current = self.shared.current_frame.load(Ordering::Relaxed);
        let remaining = self.shared.last_frame.saturating_sub(current);
        let to_write = free.min(remaining);
        let end_reached = to_write == remaining;

        let block = self.shared.info.block_align as usize;
        let start = self.shared.info.data_offset + current as usize * block;
        let bytes = &self.shared.raw[start..start + to_write as usize * block];
        self.scratch.clear();
        self.coding.decode_into(bytes, &mut self.scratch);
        ring.push(&self.scratch);

        // A starved callback during playback recovers here; it is never
        // surfaced as an error.
        if ring.take_starved() {
            tracing::debug!("output underrun recovered");
        }

        if end_reached {
            self.stop();
        } else {
            self.shared
                .current_frame
                .store(current + to_write, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::GAIN_MAX;
    use crate::wave::WaveFormat;
    use crossbeam_channel::bounded;

    fn stereo_info(frames: usize) -> StreamInfo {
        StreamInfo {
            format: WaveFormat::Pcm,
            channels: 2,
            sample_rate: 44_100,
            byte_rate: 176_400,
            block_align: 4,
            bits_per_sample: 16,
            channel_mask: 0,
            samples_per_channel: 0,
            duration_ms: frames as u64 * 1000 / 44_100,
            data_offset: 0,
            data_len: frames * 4,
        }
    }

    fn engine(frames: usize, ring_frames: usize) -> (Engine, Arc<Shared>, Arc<AtomicU32>) {
        let info = stereo_info(frames);
        let raw: Arc<[u8]> = vec![0u8; frames * 4].into();
        let ring = Arc::new(FrameRing::new(2, ring_frames));
        let master = Arc::new(AtomicU32::new(GAIN_MAX));
        let shared = Arc::new(Shared::new(
            info,
            raw,
            ring,
            Arc::downgrade(&master),
            Duration::from_millis(1),
        ));
        (
            Engine::new(shared.clone(), SampleCoding::S16),
            shared,
            master,
        )
    }

    fn submit(shared: &Shared, cmd: Command) -> crossbeam_channel::Receiver<()> {
        let (ack, ack_rx) = bounded(1);
        *shared.pending.lock().unwrap() = Some(Pending {
            cmd,
            ack,
            sync: None,
        });
        ack_rx
    }

    #[test]
    fn play_and_pause_flip_the_transport_flags() {
        let (mut engine, shared, _master) = engine(1000, 8);

        let ack = submit(&shared, Command::Play);
        engine.apply_pending();
        assert!(shared.playing.load(Ordering::Relaxed));
        assert!(!shared.paused.load(Ordering::Relaxed));
        assert!(ack.try_recv().is_ok());

        let ack = submit(&shared, Command::Pause);
        engine.apply_pending();
        assert!(!shared.playing.load(Ordering::Relaxed));
        assert!(shared.paused.load(Ordering::Relaxed));
        assert!(ack.try_recv().is_ok());
    }

    #[test]
    fn pause_rewinds_over_frames_still_buffered() {
        let (mut engine, shared, _master) = engine(1000, 8);
        shared.current_frame.store(500, Ordering::Relaxed);
        shared.ring.push(&[0.0; 6]); // 3 frames queued, unheard

        submit(&shared, Command::Pause);
        engine.apply_pending();

        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 497);
        assert_eq!(shared.ring.buffered_frames(), 0);
    }

    #[test]
    fn pause_rewind_clamps_at_zero() {
        let (mut engine, shared, _master) = engine(1000, 8);
        shared.current_frame.store(2, Ordering::Relaxed);
        shared.ring.push(&[0.0; 6]);

        submit(&shared, Command::Pause);
        engine.apply_pending();

        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn stop_resets_position_and_flushes() {
        let (mut engine, shared, _master) = engine(1000, 8);
        shared.playing.store(true, Ordering::Relaxed);
        shared.current_frame.store(123, Ordering::Relaxed);
        shared.ring.push(&[0.0; 4]);

        submit(&shared, Command::Stop);
        engine.apply_pending();

        assert!(!shared.playing.load(Ordering::Relaxed));
        assert!(shared.paused.load(Ordering::Relaxed));
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 0);
        assert_eq!(shared.ring.buffered_frames(), 0);
    }

    #[test]
    fn jump_converts_and_clamps_without_touching_flags() {
        let (mut engine, shared, _master) = engine(100_000, 8);
        shared.playing.store(true, Ordering::Relaxed);
        shared.paused.store(false, Ordering::Relaxed);

        submit(&shared, Command::Jump { target_ms: 500 });
        engine.apply_pending();
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 22_050);
        assert!(shared.playing.load(Ordering::Relaxed));
        assert!(!shared.paused.load(Ordering::Relaxed));

        submit(&shared, Command::Jump { target_ms: 1_000_000 });
        engine.apply_pending();
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 100_000);
    }

    #[test]
    fn third_party_sync_point_is_met_after_the_ack() {
        let (mut engine, shared, _master) = engine(1000, 8);
        let (point, waiter) = SyncPoint::pair();
        let waiter_thread = thread::spawn(move || waiter.wait());

        let (ack, ack_rx) = bounded(1);
        *shared.pending.lock().unwrap() = Some(Pending {
            cmd: Command::Play,
            ack,
            sync: Some(point),
        });
        engine.apply_pending();

        assert!(ack_rx.try_recv().is_ok());
        waiter_thread.join().unwrap();
    }

    #[test]
    fn pump_waits_until_the_ring_is_half_empty() {
        let (mut engine, shared, _master) = engine(1000, 8);
        shared.ring.push(&[0.0; 10]); // 5 of 8 frames buffered
        engine.pump();
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 0);
        assert_eq!(shared.ring.buffered_frames(), 5);
    }

    #[test]
    fn pump_fills_free_space_and_advances() {
        let (mut engine, shared, _master) = engine(1000, 8);
        engine.pump();
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 8);
        assert_eq!(shared.ring.buffered_frames(), 8);
    }

    #[test]
    fn pump_performs_an_implicit_stop_at_end_of_stream() {
        let (mut engine, shared, _master) = engine(5, 8);
        shared.playing.store(true, Ordering::Relaxed);
        shared.paused.store(false, Ordering::Relaxed);

        engine.pump();

        // The write reached the end: position resets and the transport
        // returns to paused, like an explicit stop.
        assert_eq!(shared.current_frame.load(Ordering::Relaxed), 0);
        assert!(!shared.playing.load(Ordering::Relaxed));
        assert!(shared.paused.load(Ordering::Relaxed));
    }

    #[test]
    fn run_loop_exits_on_halt_without_applying_commands() {
        let (mut engine, shared, _master) = engine(1000, 8);
        shared.halt.store(true, Ordering::Relaxed);
        submit(&shared, Command::Play);
        engine.run_loop();
        assert!(!shared.playing.load(Ordering::Relaxed));
    }
}
