//! `wave-cli` — play a WAVE file and drive the transport from stdin.
//!
//! Commands on stdin, one per line:
//! - `p`: toggle play/pause
//! - `s`: stop (back to the start)
//! - `j <ms>`: jump to a position
//! - `v <0..100>`: set master volume
//! - `q`: quit

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wave_player::{Player, PlayerConfig, PlayerError, Severity};

#[derive(Parser, Debug)]
#[command(name = "wave-cli", version)]
struct Args {
    /// WAVE file to play.
    file: PathBuf,

    /// Output device description substring (default device if omitted).
    #[arg(long)]
    device: Option<String>,

    /// Engine tick resolution in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u32,

    /// Initial master volume (0..100).
    #[arg(long)]
    volume: Option<u8>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let raw: Arc<[u8]> = std::fs::read(&args.file)
        .with_context(|| format!("read {:?}", args.file))?
        .into();

    let player = Player::new(
        raw,
        PlayerConfig {
            device_name: args.device.clone(),
            tick_ms: args.tick_ms,
        },
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    if let Some(volume) = args.volume {
        report(player.set_volume(volume));
    }

    let info = player.stream_info();
    tracing::info!(
        channels = info.channels,
        sample_rate = info.sample_rate,
        duration_ms = player.total_duration_ms(),
        "loaded {:?}",
        args.file
    );

    let quit = Arc::new(AtomicBool::new(false));
    let quit_on_signal = quit.clone();
    ctrlc::set_handler(move || {
        quit_on_signal.store(true, Ordering::Relaxed);
    })?;

    report(player.play(None));

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if quit.load(Ordering::Relaxed) {
            break;
        }
        let line = line?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("p") => {
                if player.is_playing() {
                    report(player.pause(None));
                } else {
                    report(player.play(None));
                }
            }
            Some("s") => player.stop(None),
            Some("j") => match parts.next().and_then(|ms| ms.parse().ok()) {
                Some(ms) => report(player.jump(ms, None)),
                None => tracing::warn!("usage: j <milliseconds>"),
            },
            Some("v") => match parts.next().and_then(|v| v.parse().ok()) {
                Some(v) => report(player.set_volume(v)),
                None => tracing::warn!("usage: v <0..100>"),
            },
            Some("q") => break,
            Some(other) => tracing::warn!("unknown command: {other}"),
            None => {
                tracing::info!(
                    position_ms = player.current_time_ms(),
                    playing = player.is_playing(),
                    volume = player.volume().ok(),
                    "status"
                );
            }
        }
    }

    player.stop(None);
    Ok(())
}

/// Log warnings, keep going; real errors have already been applied to
/// the session's error slot and are only reported here.
fn report(result: std::result::Result<(), PlayerError>) {
    if let Err(e) = result {
        match e.severity() {
            Severity::Warning => tracing::warn!("{e}"),
            _ => tracing::error!("{e}"),
        }
    }
}
