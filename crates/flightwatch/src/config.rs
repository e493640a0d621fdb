//! Configuration management for flightwatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::DEFAULT_KEY_FIELD;
use crate::source::{SourceKind, PLANE_TITLES};
use crate::tracking::ReentryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "flightwatch";

/// Default journal database file name.
const DATABASE_FILE_NAME: &str = "journal.db";

/// Default CSV snapshot file, relative to the working directory.
const DEFAULT_CSV_PATH: &str = "schedule.csv";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTWATCH_`, `__` between sections)
/// 2. TOML config file at `~/.config/flightwatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot source configuration.
    pub source: SourceConfig,
    /// Synthetic generator configuration.
    pub synthetic: SyntheticConfig,
    /// Tracking configuration.
    pub tracking: TrackingConfig,
    /// Journal configuration.
    pub storage: StorageConfig,
    /// Terminal output configuration.
    pub display: DisplayConfig,
}

/// Where snapshots come from and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Which source to poll.
    pub kind: SourceKind,
    /// CSV file re-read on every tick.
    pub csv_path: PathBuf,
    /// Column holding each row's key.
    pub key_column: String,
    /// Seconds between ticks. Defaults depend on `kind`.
    pub interval_secs: Option<u64>,
}

/// Synthetic plane-movement generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Seed for reproducible runs. Random when unset.
    pub seed: Option<u64>,
    /// Fraction of rows added or removed per tick (at least one change).
    pub change_rate: f64,
    /// Minimum number of planes in the first snapshot.
    pub initial_min: usize,
}

/// Tracking settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// What happens when a key reappears after being absent.
    pub reentry: ReentryPolicy,
}

/// Journal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Record every tick in the journal database.
    pub journal_enabled: bool,
    /// Path to the database file.
    /// Defaults to `~/.local/share/flightwatch/journal.db`
    pub database_path: Option<PathBuf>,
    /// Maximum number of ticks to retain.
    /// Set to 0 for unlimited.
    pub max_ticks: usize,
}

/// Terminal output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Color additions green and removals red.
    pub color: bool,
    /// Print the tracking table after each tick.
    pub show_tracking: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            key_column: DEFAULT_KEY_FIELD.to_string(),
            interval_secs: None, // Resolved from kind at runtime
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: None,
            change_rate: 0.05,
            initial_min: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            journal_enabled: true,
            database_path: None, // Will be resolved to default at runtime
            max_ticks: 10_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_tracking: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FLIGHTWATCH_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.source.interval_secs == Some(0) {
            return Err(Error::config_validation(
                "interval_secs must be greater than 0",
            ));
        }

        if self.source.key_column.trim().is_empty() {
            return Err(Error::config_validation("key_column must not be empty"));
        }

        let rate = self.synthetic.change_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(Error::config_validation(format!(
                "change_rate ({rate}) must be in (0, 1]"
            )));
        }

        if self.synthetic.initial_min == 0 || self.synthetic.initial_min > PLANE_TITLES.len() {
            return Err(Error::config_validation(format!(
                "initial_min ({}) must be between 1 and {}",
                self.synthetic.initial_min,
                PLANE_TITLES.len()
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the tick interval, falling back to the source kind's default.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        let secs = self
            .source
            .interval_secs
            .unwrap_or_else(|| self.source.kind.default_interval_secs());
        Duration::from_secs(secs)
    }
}
