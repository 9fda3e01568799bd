//! Configuration for the recording core
//!
//! Provides centralized configuration for all components. Every field has a
//! default, so a TOML file only needs the keys it changes.

use crate::{RecitalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timer settings for the recording state machine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Period of the countdown and duration timers
    pub tick_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

impl RecordingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Cosmetic waveform animation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub bar_count: usize,
    /// Steps before the amplitude set is regenerated
    pub steps_per_cycle: usize,
    /// Lowest generated amplitude, in `[0.0, 1.0)`
    pub amplitude_floor: f32,
    /// Fixed RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 120,
            bar_count: 28,
            steps_per_cycle: 16,
            amplitude_floor: 0.15,
            seed: None,
        }
    }
}

impl WaveformConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Endpoints and fixed markers for the two submission calls
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub base_url: String,
    pub token_path: String,
    pub upload_path: String,
    /// Role marker sent with every token request
    pub role: String,
    /// Environment marker sent with every token request
    pub environment: String,
    pub timeout_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_path: "/api/exercise/token".to_string(),
            upload_path: "/api/exercise/upload".to_string(),
            role: "student".to_string(),
            environment: "production".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl SubmissionConfig {
    pub fn token_url(&self) -> String {
        join_url(&self.base_url, &self.token_path)
    }

    pub fn upload_url(&self) -> String {
        join_url(&self.base_url, &self.upload_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Configuration for a complete exercise attempt
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecitalConfig {
    pub recording: RecordingConfig,
    pub waveform: WaveformConfig,
    pub submission: SubmissionConfig,
    /// Where simulated and platform capture devices write WAV artifacts
    pub artifact_dir: Option<PathBuf>,
}

impl RecitalConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RecitalError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RecitalError::ConfigError(msg) => {
                RecitalError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RecitalConfig =
            toml::from_str(content).map_err(|e| RecitalError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the submission settings
    pub fn with_submission(mut self, submission: SubmissionConfig) -> Self {
        self.submission = submission;
        self
    }

    /// Point both endpoints at another server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.submission.base_url = base_url.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Make the waveform animation reproducible
    pub fn with_waveform_seed(mut self, seed: u64) -> Self {
        self.waveform.seed = Some(seed);
        self
    }

    /// Disable the waveform animation timer
    pub fn without_waveform(mut self) -> Self {
        self.waveform.enabled = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.recording.tick_interval_ms == 0 {
            return Err(RecitalError::ConfigError(
                "recording.tick_interval_ms must be positive".to_string(),
            ));
        }

        if self.waveform.enabled {
            if self.waveform.interval_ms == 0 {
                return Err(RecitalError::ConfigError(
                    "waveform.interval_ms must be positive".to_string(),
                ));
            }
            if self.waveform.bar_count == 0 || self.waveform.steps_per_cycle == 0 {
                return Err(RecitalError::ConfigError(
                    "waveform.bar_count and waveform.steps_per_cycle must be positive".to_string(),
                ));
            }
        }

        let base = &self.submission.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RecitalError::ConfigError(format!(
                "submission.base_url must be an http(s) URL: {}",
                base
            )));
        }
        if self.submission.role.trim().is_empty() || self.submission.environment.trim().is_empty() {
            return Err(RecitalError::ConfigError(
                "submission.role and submission.environment are required".to_string(),
            ));
        }
        if self.submission.timeout_ms == 0 {
            return Err(RecitalError::ConfigError(
                "submission.timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
