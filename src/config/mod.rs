use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{DeviceId, RecordLimits, WaveFormat};
use crate::error::{ConfigError, StreamError};

/// Defaults for new recordings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Stop after this many seconds; unset records until silence
    pub max_seconds: Option<f64>,
    /// Seconds of continuous silence that end a recording, 0 to disable
    pub quiet_seconds: f64,
    pub quiet_threshold: f64,
    pub seconds_per_chunk: f64,
    pub wait_for_sound: bool,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 11025,
            bits_per_sample: 8,
            max_seconds: None,
            quiet_seconds: 1.0,
            quiet_threshold: 0.005,
            seconds_per_chunk: 0.5,
            wait_for_sound: true,
        }
    }
}

impl RecordingSettings {
    pub fn format(&self) -> Result<WaveFormat, StreamError> {
        WaveFormat::from_bits(self.channels, self.sample_rate, self.bits_per_sample)
    }

    pub fn limits(&self) -> RecordLimits {
        RecordLimits::new(
            self.max_seconds,
            self.quiet_seconds,
            self.quiet_threshold,
            self.wait_for_sound,
        )
    }
}

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Output device index; unset uses the system default
    pub playback_device: Option<u32>,
    /// Input device index; unset uses the system default
    pub recording_device: Option<u32>,
    pub wait_timeout_ms: u64,
    pub playback_chunk_ms: u64,
    pub recording: RecordingSettings,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            playback_device: None,
            recording_device: None,
            wait_timeout_ms: 500,
            playback_chunk_ms: 500,
            recording: RecordingSettings::default(),
        }
    }
}

impl WaveConfig {
    pub fn playback_device_id(&self) -> DeviceId {
        DeviceId::from(self.playback_device)
    }

    pub fn recording_device_id(&self) -> DeviceId {
        DeviceId::from(self.recording_device)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn playback_chunk(&self) -> Duration {
        Duration::from_millis(self.playback_chunk_ms)
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: WaveConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_config(&config_path).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable config at {}: {}", config_path.display(), e);
            WaveConfig::default()
        });

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &WaveConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut WaveConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_playback_device(&mut self, device: Option<u32>) -> Result<(), ConfigError> {
        self.config.playback_device = device;
        self.save_config()
    }

    pub fn set_recording_device(&mut self, device: Option<u32>) -> Result<(), ConfigError> {
        self.config.recording_device = device;
        self.save_config()
    }

    pub fn set_wait_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), ConfigError> {
        self.config.wait_timeout_ms = timeout_ms.max(1);
        self.save_config()
    }

    pub fn set_quiet_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        self.config.recording.quiet_threshold = threshold.max(0.0);
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = WaveConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("wavestream");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<WaveConfig, ConfigError> {
        if !path.exists() {
            return Ok(WaveConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: WaveConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        // Ensure the parent directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}
