use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};

/// Which quality selection policy drives the video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbrAlgorithm {
    #[default]
    Adaptive,
    Fixed,
    Random,
}

/// Runtime settings of a [`StreamPlayer`](crate::StreamPlayer).
///
/// Every field has a default so a JSON file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Manifest location. `.mpd` selects DASH, anything else Smooth Streaming.
    pub url: String,
    pub algorithm: AbrAlgorithm,
    /// Pinned level for [`AbrAlgorithm::Fixed`].
    pub level: Option<usize>,
    /// Preferred protection flavor (`clearkey`, `widevine`, `playready`).
    pub flavor: Option<String>,
    /// Start in the auto-paused state so playback begins as soon as enough is buffered.
    pub autoplay: bool,
    pub tick_interval_ms: u64,
    // Buffering thresholds, in seconds.
    pub enough_buffer_secs: f64,
    pub seek_resume_secs: f64,
    pub auto_pause_start_secs: f64,
    pub pause_resume_secs: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            url: String::new(),
            algorithm: AbrAlgorithm::Adaptive,
            level: None,
            flavor: None,
            autoplay: false,
            tick_interval_ms: 250,
            enough_buffer_secs: 20.0,
            seek_resume_secs: 5.0,
            auto_pause_start_secs: 1.0,
            pause_resume_secs: 5.0,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PlayerError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(PlayerError::Config("a manifest url is required".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::Config("tick interval must be positive".to_string()));
        }
        if self.algorithm == AbrAlgorithm::Fixed && self.level.is_none() {
            return Err(PlayerError::Config("the fixed algorithm needs a level".to_string()));
        }
        Ok(())
    }

    /// Thresholds handed to each track.
    pub fn track_thresholds(&self) -> TrackThresholds {
        TrackThresholds {
            enough_buffer: self.enough_buffer_secs,
            seek_resume: self.seek_resume_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackThresholds {
    pub enough_buffer: f64,
    pub seek_resume: f64,
}

impl Default for TrackThresholds {
    fn default() -> Self {
        PlayerConfig::default().track_thresholds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PlayerConfig::from_json_str(r#"{"url": "http://host/a.mpd", "algorithm": "fixed", "level": 1}"#).unwrap();
        assert_eq!(config.algorithm, AbrAlgorithm::Fixed);
        assert_eq!(config.level, Some(1));
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.seek_resume_secs, 5.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_missing_url_and_unknown_algorithm() {
        assert!(matches!(PlayerConfig::default().validate(), Err(PlayerError::Config(_))));
        assert!(PlayerConfig::from_json_str(r#"{"algorithm": "greedy"}"#).is_err());
    }
}
