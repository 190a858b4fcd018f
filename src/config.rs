//! Tunable thresholds for sessions and the mixer, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::time::Millis;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Playback session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Decoded-ahead time required to leave buffering
    #[serde(default = "default_buffer_time")]
    pub buffer_time_ms: Millis,
    /// Hard cap of decoded audio chunks waiting for the mixer
    #[serde(default = "default_queue_capacity")]
    pub audio_queue_capacity: usize,
    /// How far past the playhead audio is decoded
    #[serde(default = "default_lookahead")]
    pub audio_lookahead_ms: Millis,
    #[serde(default = "default_parse_chunks")]
    pub parse_chunks_per_advance: usize,
    /// Tick period of the advance driver
    #[serde(default = "default_advance_interval")]
    pub advance_interval_ms: Millis,
    /// Failures without a single success before the input is given up
    #[serde(default = "default_max_failures")]
    pub max_decode_failures: u32,
}

fn default_buffer_time() -> Millis {
    100
}

fn default_queue_capacity() -> usize {
    20
}

fn default_lookahead() -> Millis {
    100
}

fn default_parse_chunks() -> usize {
    2
}

fn default_advance_interval() -> Millis {
    50
}

fn default_max_failures() -> u32 {
    16
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_time_ms: default_buffer_time(),
            audio_queue_capacity: default_queue_capacity(),
            audio_lookahead_ms: default_lookahead(),
            parse_chunks_per_advance: default_parse_chunks(),
            advance_interval_ms: default_advance_interval(),
            max_decode_failures: default_max_failures(),
        }
    }
}

/// Sound handler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Percent, 0..=100
    #[serde(default = "default_global_volume")]
    pub global_volume: i32,
    #[serde(default)]
    pub start_muted: bool,
}

fn default_global_volume() -> i32 {
    100
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            global_volume: default_global_volume(),
            start_muted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub mixer: MixerConfig,
}

impl Config {
    /// Load from a JSON file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config = serde_json::from_str(&contents)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
