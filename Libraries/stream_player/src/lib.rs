pub mod abr;
pub mod config;
pub mod drm;
pub mod error;
pub mod estimator;
pub mod manifest;
pub mod orchestrator;
pub mod player;
pub mod session;
pub mod sink;
pub mod track;
pub mod transport;

use std::sync::Arc;

use crate::manifest::TrackKind;

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    QualitySwitch {
        track: TrackKind,
        old_bandwidth: u64,
        new_bandwidth: u64,
    },
    TrackExhausted {
        track: TrackKind,
    },
    EndOfStream,
    KeySystemSelected {
        flavor: String,
        key_system: String,
        license_url: String,
        init_data: Option<Vec<u8>>,   // pssh data for the key system, when the manifest carries it
    },
    Warning(String),
}

pub type PlayerCallback = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

pub use config::{AbrAlgorithm, PlayerConfig};
pub use error::{PlayerError, Result};
pub use manifest::{Manifest, StreamFormat};
pub use player::{PlayerControl, PlayerHandle, StreamPlayer};
pub use sink::{MediaSink, MemorySink, TimeRange};
