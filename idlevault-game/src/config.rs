//! Reward, simulation and save-location configuration.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;

const DEFAULT_REWARD_CONFIG: &str = include_str!("../data/reward_config.json");

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },
    #[error("{field} must be a finite, non-negative number (got {value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("speed range invalid (min {min} must be > 0 and <= max {max})")]
    SpeedRange { min: f64, max: f64 },
    #[error("speed step must be at least 1 (got {step})")]
    SpeedStep { step: f64 },
    #[error("{field} must name a path component (got {value:?})")]
    SavePath { field: &'static str, value: String },
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-minute accrual rates and the collection gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default = "RateConfig::default_coin_per_minute")]
    pub coin_per_minute: i64,
    #[serde(default = "RateConfig::default_hammer_per_minute")]
    pub hammer_per_minute: i64,
    /// Collect becomes available only once earned minutes reach this value.
    #[serde(default = "RateConfig::default_min_collect_minutes")]
    pub min_collect_minutes: i64,
}

impl RateConfig {
    const fn default_coin_per_minute() -> i64 {
        constants::DEFAULT_COIN_PER_MINUTE
    }

    const fn default_hammer_per_minute() -> i64 {
        constants::DEFAULT_HAMMER_PER_MINUTE
    }

    const fn default_min_collect_minutes() -> i64 {
        constants::DEFAULT_MIN_COLLECT_MINUTES
    }

    /// Validate rate invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if any rate or the gate is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("coin_per_minute", self.coin_per_minute),
            ("hammer_per_minute", self.hammer_per_minute),
            ("min_collect_minutes", self.min_collect_minutes),
        ] {
            if value < 0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            coin_per_minute: Self::default_coin_per_minute(),
            hammer_per_minute: Self::default_hammer_per_minute(),
            min_collect_minutes: Self::default_min_collect_minutes(),
        }
    }
}

/// Development clock tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_start_seconds")]
    pub start_seconds: f64,
    #[serde(default = "SimulationConfig::default_speed_multiplier")]
    pub speed_multiplier: f64,
    #[serde(default = "SimulationConfig::default_speed_step")]
    pub speed_step: f64,
    #[serde(default = "SimulationConfig::default_min_speed")]
    pub min_speed: f64,
    #[serde(default = "SimulationConfig::default_max_speed")]
    pub max_speed: f64,
}

impl SimulationConfig {
    const fn default_start_seconds() -> f64 {
        constants::DEFAULT_SIM_START_SECONDS
    }

    const fn default_speed_multiplier() -> f64 {
        constants::DEFAULT_SPEED_MULTIPLIER
    }

    const fn default_speed_step() -> f64 {
        constants::DEFAULT_SPEED_STEP
    }

    const fn default_min_speed() -> f64 {
        constants::DEFAULT_MIN_SPEED
    }

    const fn default_max_speed() -> f64 {
        constants::DEFAULT_MAX_SPEED
    }

    /// Validate simulation invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is non-finite or negative, or if the speed
    /// range or step is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("start_seconds", self.start_seconds),
            ("speed_multiplier", self.speed_multiplier),
            ("speed_step", self.speed_step),
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.min_speed <= 0.0 || self.min_speed > self.max_speed {
            return Err(ConfigError::SpeedRange {
                min: self.min_speed,
                max: self.max_speed,
            });
        }
        if self.speed_step < 1.0 {
            return Err(ConfigError::SpeedStep {
                step: self.speed_step,
            });
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_seconds: Self::default_start_seconds(),
            speed_multiplier: Self::default_speed_multiplier(),
            speed_step: Self::default_speed_step(),
            min_speed: Self::default_min_speed(),
            max_speed: Self::default_max_speed(),
        }
    }
}

/// Fixed relative location of the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    #[serde(default = "SaveConfig::default_directory")]
    pub directory: String,
    #[serde(default = "SaveConfig::default_file_name")]
    pub file_name: String,
}

impl SaveConfig {
    fn default_directory() -> String {
        constants::DEFAULT_SAVE_DIRECTORY.to_string()
    }

    fn default_file_name() -> String {
        constants::DEFAULT_SAVE_FILE_NAME.to_string()
    }

    /// Both components must be non-blank, and the file name must not be a
    /// `.`/`..` directory reference.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SavePath`] for the first bad component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad_directory = self.directory.trim().is_empty();
        let bad_file = matches!(self.file_name.trim(), "" | "." | "..");
        for (field, value, bad) in [
            ("save.directory", &self.directory, bad_directory),
            ("save.file_name", &self.file_name, bad_file),
        ] {
            if bad {
                return Err(ConfigError::SavePath {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Full path of the save file beneath `base`.
    #[must_use]
    pub fn path(&self, base: &Path) -> PathBuf {
        base.join(&self.directory).join(&self.file_name)
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            file_name: Self::default_file_name(),
        }
    }
}

/// Complete configuration bundle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub rates: RateConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub save: SaveConfig,
}

impl RewardConfig {
    /// Parse and validate configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails [`Self::from_json`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Bundled configuration, falling back to compiled defaults.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_REWARD_CONFIG).unwrap_or_default()
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rates.validate()?;
        self.simulation.validate()?;
        self.save.validate()
    }
}
