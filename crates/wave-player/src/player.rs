//! Public playback session.
//!
//! [`Player::new`] decodes the buffer synchronously, negotiates the
//! output device, and starts the engine thread only when both succeed.
//! Transport requests are serialized by one action lock and block until
//! the engine's next tick applies them; queries are relaxed reads.
//! Dropping the player halts and joins the engine, which closes the
//! output on its way out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::device;
use crate::engine::{Command, Engine, Pending, Shared};
use crate::error::PlayerError;
use crate::mixer::{self, Mixer};
use crate::ring::FrameRing;
use crate::sync::SyncPoint;
use crate::wave::StreamInfo;

pub struct Player {
    shared: Arc<Shared>,
    action: Mutex<()>,
    engine: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Decode `raw`, configure the output device, and start the engine.
    ///
    /// The sample data is never copied: the session keeps a reference
    /// into `raw` for its whole lifetime. The transport starts paused.
    pub fn new(raw: Arc<[u8]>, config: PlayerConfig) -> Result<Player, PlayerError> {
        let info = StreamInfo::parse(&raw)?;
        let tick_ms = config.tick_ms.max(1);
        let negotiated = device::negotiate(&info, config.device_name.as_deref(), tick_ms)?;
        tracing::info!(
            channels = info.channels,
            sample_rate = info.sample_rate,
            duration_ms = info.duration_ms,
            ring_frames = negotiated.ring_frames,
            layout = ?negotiated.layout,
            "stream negotiated"
        );

        let ring = Arc::new(FrameRing::new(
            info.channels as usize,
            negotiated.ring_frames,
        ));
        let master = Arc::new(AtomicU32::new(mixer::GAIN_MAX));
        let shared = Arc::new(Shared::new(
            info,
            raw,
            ring,
            Arc::downgrade(&master),
            Duration::from_millis(tick_ms as u64),
        ));
        let coding = negotiated.coding;

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let engine_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("wave-player-engine".into())
            .spawn(move || Engine::new(engine_shared, coding).run(negotiated, master, ready_tx))
            .map_err(|e| PlayerError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Player {
                shared,
                action: Mutex::new(()),
                engine: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(PlayerError::Device(
                    "engine thread exited during startup".into(),
                ))
            }
        }
    }

    /// Start playback. Warns with [`PlayerError::AlreadyPlaying`] when
    /// the transport is already playing; nothing changes in that case.
    pub fn play(&self, sync: Option<SyncPoint>) -> Result<(), PlayerError> {
        self.clear_error();
        let guard = self.action.lock().unwrap();
        if self.shared.playing.load(Ordering::Relaxed) {
            return Err(self.record(PlayerError::AlreadyPlaying));
        }
        self.submit(Command::Play, sync, guard);
        Ok(())
    }

    /// Pause playback, rewinding over frames that were queued but never
    /// heard. Warns with [`PlayerError::AlreadyPaused`] when the
    /// transport is not playing.
    pub fn pause(&self, sync: Option<SyncPoint>) -> Result<(), PlayerError> {
        self.clear_error();
        let guard = self.action.lock().unwrap();
        if !self.shared.playing.load(Ordering::Relaxed) {
            return Err(self.record(PlayerError::AlreadyPaused));
        }
        self.submit(Command::Pause, sync, guard);
        Ok(())
    }

    /// Stop playback and reset the position to the start. Always accepted.
    pub fn stop(&self, sync: Option<SyncPoint>) {
        self.clear_error();
        let guard = self.action.lock().unwrap();
        self.submit(Command::Stop, sync, guard);
    }

    /// Move the position to `target_ms`. Always applied; a target beyond
    /// the total duration is clamped to the last playable frame and
    /// reported as [`PlayerError::JumpBeyondEnd`].
    pub fn jump(&self, target_ms: u64, sync: Option<SyncPoint>) -> Result<(), PlayerError> {
        self.clear_error();
        let guard = self.action.lock().unwrap();
        let beyond_end = target_ms > self.shared.info.duration_ms;
        self.submit(Command::Jump { target_ms }, sync, guard);
        if beyond_end {
            return Err(self.record(PlayerError::JumpBeyondEnd));
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.clear_error();
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.clear_error();
        self.shared.paused.load(Ordering::Relaxed)
    }

    /// Current position in milliseconds.
    pub fn current_time_ms(&self) -> u64 {
        self.clear_error();
        self.shared.current_frame.load(Ordering::Relaxed) * 1000
            / self.shared.info.sample_rate as u64
    }

    /// Total stream duration in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.clear_error();
        self.shared.info.duration_ms
    }

    /// Master volume, 0..=100.
    pub fn volume(&self) -> Result<u8, PlayerError> {
        self.clear_error();
        let mixer = Mixer::open(&self.shared.gain).map_err(|e| self.record(e))?;
        Ok(mixer.volume())
    }

    /// Set the master volume; values above 100 are clamped.
    pub fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.clear_error();
        let mixer = Mixer::open(&self.shared.gain).map_err(|e| self.record(e))?;
        mixer.set_volume(percent);
        Ok(())
    }

    /// The decoded stream descriptor.
    pub fn stream_info(&self) -> &StreamInfo {
        &self.shared.info
    }

    /// The error or warning recorded by the most recent operation, if any.
    pub fn last_error(&self) -> Option<PlayerError> {
        self.shared.last_error.lock().unwrap().clone()
    }

    /// Store the command and block until the engine's next tick applies
    /// it and meets the rendezvous. The action lock is held throughout,
    /// so requests from other threads queue up behind this one.
    fn submit(&self, cmd: Command, sync: Option<SyncPoint>, guard: MutexGuard<'_, ()>) {
        let (ack, ack_rx) = crossbeam_channel::bounded(0);
        *self.shared.pending.lock().unwrap() = Some(Pending { cmd, ack, sync });
        let _ = ack_rx.recv();
        drop(guard);
    }

    fn clear_error(&self) {
        *self.shared.last_error.lock().unwrap() = None;
    }

    fn record(&self, err: PlayerError) -> PlayerError {
        *self.shared.last_error.lock().unwrap() = Some(err.clone());
        err
    }
}

impl Drop for Player {
    /// Teardown order is fixed: signal halt, join the engine (which
    /// closes the output stream on its own thread), then let the shared
    /// state and synchronization primitives fall with the session.
    fn drop(&mut self) {
        self.shared.halt.store(true, Ordering::Relaxed);
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}
