pub mod chmap;
pub mod config;
mod device;
mod engine;
pub mod error;
mod mixer;
mod output;
mod player;
mod ring;
pub mod sample;
mod sync;
pub mod wave;

pub use config::PlayerConfig;
pub use error::{PlayerError, Severity};
pub use player::Player;
pub use sync::{SyncPoint, SyncWaiter};
pub use wave::{StreamInfo, WaveFormat};
