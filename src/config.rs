//! Player Configuration
//!
//! Settings that shape playback without being part of the song: tick rate,
//! channel mutes, the percussion overlay policy and the event queue size.
//! Stored as JSON.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::song::TvStandard;
use crate::{PlayerError, Result, NUM_CHANNELS};

/// Default capacity of the engine's event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What an overlay percussion does once its envelope is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPolicy {
    /// Keep emitting the last frame's register values
    #[default]
    HoldLastFrame,
    /// Silence like a non-overlay percussion
    Silence,
}

/// Playback settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Tick rate
    pub tv_standard: TvStandard,
    /// Channels muted at startup
    pub muted_channels: Vec<usize>,
    /// Exhausted overlay percussion behaviour
    pub overlay_policy: OverlayPolicy,
    /// Capacity of the bounded event queue
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            tv_standard: TvStandard::Pal,
            muted_channels: Vec::new(),
            overlay_policy: OverlayPolicy::HoldLastFrame,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Load a configuration file, falling back to defaults if it is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(PlayerError::ConfigError("event_capacity must be at least 1".into()));
        }
        if let Some(&channel) = self.muted_channels.iter().find(|&&ch| ch >= NUM_CHANNELS) {
            return Err(PlayerError::ConfigError(format!(
                "muted channel {} does not exist (have {})",
                channel, NUM_CHANNELS
            )));
        }
        Ok(())
    }
}
