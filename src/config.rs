use crate::audio::SampleEncoding;
use crate::audio::wav_sink::{DEFAULT_QUEUE_FRAMES, MAX_QUEUE_FRAMES};
use crate::graph::MAX_TAP_BUFFER_SIZE;
use crate::recording::{DEFAULT_TAP_BUFFER_SIZE, FailurePolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_tap_buffer_size")]
    pub tap_buffer_size: usize,

    /// Frames the WAV writer queue holds before buffers are dropped.
    #[serde(default = "default_sink_queue_frames")]
    pub sink_queue_frames: usize,

    /// Report start/stop failures instead of ignoring them.
    #[serde(default = "default_strict")]
    pub strict: bool,

    /// Force the playback engine to this rate instead of the device default.
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Store recordings with this encoding instead of the mixer's float format.
    #[serde(default)]
    pub record_encoding: Option<SampleEncoding>,

    #[serde(default = "default_tone_frequency")]
    pub tone_frequency: f32,

    #[serde(default = "default_tone_amplitude")]
    pub tone_amplitude: f32,

    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_file_prefix() -> String {
    "mixtap".to_string()
}

fn default_tap_buffer_size() -> usize {
    DEFAULT_TAP_BUFFER_SIZE
}

fn default_sink_queue_frames() -> usize {
    DEFAULT_QUEUE_FRAMES
}

fn default_strict() -> bool {
    true
}

fn default_tone_frequency() -> f32 {
    440.0
}

fn default_tone_amplitude() -> f32 {
    0.2
}

fn default_volume() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            tap_buffer_size: default_tap_buffer_size(),
            sink_queue_frames: default_sink_queue_frames(),
            strict: default_strict(),
            sample_rate: None,
            record_encoding: None,
            tone_frequency: default_tone_frequency(),
            tone_amplitude: default_tone_amplitude(),
            volume: default_volume(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/mixtap/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("mixtap").join("config.json"))
    }

    pub fn policy(&self) -> FailurePolicy {
        if self.strict {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Lenient
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.is_empty() {
            return Err(anyhow::anyhow!("file_prefix cannot be empty"));
        }

        if !(1..=MAX_TAP_BUFFER_SIZE).contains(&self.tap_buffer_size) {
            return Err(anyhow::anyhow!(
                "tap_buffer_size must be between 1 and {}",
                MAX_TAP_BUFFER_SIZE
            ));
        }

        if !(self.tap_buffer_size..=MAX_QUEUE_FRAMES).contains(&self.sink_queue_frames) {
            return Err(anyhow::anyhow!(
                "sink_queue_frames must be between tap_buffer_size and {}",
                MAX_QUEUE_FRAMES
            ));
        }

        if self.sample_rate == Some(0) {
            return Err(anyhow::anyhow!("sample_rate must be greater than 0"));
        }

        if !(self.tone_frequency > 0.0) {
            return Err(anyhow::anyhow!("tone_frequency must be positive"));
        }

        if !(0.0..=1.0).contains(&self.tone_amplitude) {
            return Err(anyhow::anyhow!("tone_amplitude must be between 0 and 1"));
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err(anyhow::anyhow!("volume must be between 0 and 1"));
        }

        Ok(())
    }
}
