// Engine configuration - scheduler timing and MIDI client settings, stored as RON

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lookahead scheduler timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock period between scheduling ticks (ms)
    pub interval_ms: f64,
    /// How far past the playhead each tick schedules notes (ms)
    pub lookahead_ms: f64,
    /// Latency reserved so the audio anchor starts together with MIDI (ms)
    pub sync_pad_ms: f64,
    /// MIDI channel used for playback (0-15)
    pub channel: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 25.0,
            lookahead_ms: 100.0,
            sync_pad_ms: 50.0,
            channel: 0,
        }
    }
}

/// MIDI client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Client name announced to the OS MIDI layer
    pub client_name: String,
    /// Capacity of the input ringbuffer between the midir thread and the recorder
    pub input_buffer_capacity: usize,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: "MyMusic Recorder".to_string(),
            // ~500ms of back-to-back messages at full MIDI 1.0 bandwidth
            input_buffer_capacity: 512,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub midi: MidiConfig,
}

impl EngineConfig {
    /// Default location: `<config dir>/mymusic_recorder/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mymusic_recorder").join("config.ron"))
    }

    /// Load and validate a RON config file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_ron(&data)
    }

    /// Load `path` if given, else the default location if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading engine config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_ron(data: &str) -> Result<Self> {
        let config: Self = ron::from_str(data)
            .map_err(|e| EngineError::InvalidConfig(format!("Failed to parse RON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| EngineError::InvalidConfig(format!("Failed to serialize to RON: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;

        if !(s.interval_ms > 0.0) {
            return Err(EngineError::InvalidConfig(
                "Scheduler interval must be > 0 ms".to_string(),
            ));
        }

        if !(s.lookahead_ms >= s.interval_ms) {
            return Err(EngineError::InvalidConfig(
                "Lookahead must be at least one scheduler interval".to_string(),
            ));
        }

        if !(s.sync_pad_ms >= 0.0) {
            return Err(EngineError::InvalidConfig(
                "Sync pad cannot be negative".to_string(),
            ));
        }

        if s.channel > 15 {
            return Err(EngineError::InvalidConfig(
                "MIDI channel must be between 0 and 15".to_string(),
            ));
        }

        if self.midi.input_buffer_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "Input buffer capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.interval_ms, 25.0);
        assert_eq!(config.scheduler.lookahead_ms, 100.0);
        assert_eq!(config.scheduler.sync_pad_ms, 50.0);
        assert_eq!(config.midi.input_buffer_capacity, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = EngineConfig::from_ron("(scheduler: (lookahead_ms: 200.0))").unwrap();
        assert_eq!(config.scheduler.lookahead_ms, 200.0);
        assert_eq!(config.scheduler.interval_ms, 25.0);
        assert_eq!(config.midi.client_name, "MyMusic Recorder");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_ron("(scheduler: (interval_ms: 0.0))").is_err());
        assert!(EngineConfig::from_ron("(scheduler: (lookahead_ms: 10.0))").is_err());
        assert!(EngineConfig::from_ron("(scheduler: (channel: 16))").is_err());
        assert!(EngineConfig::from_ron("(midi: (input_buffer_capacity: 0))").is_err());
        assert!(EngineConfig::from_ron("not ron at all").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut config = EngineConfig::default();
        config.scheduler.channel = 9;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let explicit = EngineConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(explicit.scheduler.channel, 9);
    }
}
