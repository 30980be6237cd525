//! Configuration file support for peptrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/peptrack/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }
}

/// Schedule window configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Days after the start date when no end date is given
    #[serde(default = "default_schedule_window_days")]
    pub default_window_days: i64,

    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_schedule_window_days(),
            max_range_days: default_max_range_days(),
        }
    }
}

/// Adherence statistics window configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Days looked back from today when no start date is given
    #[serde(default = "default_stats_window_days")]
    pub default_window_days: i64,

    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_stats_window_days(),
            max_range_days: default_max_range_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("peptrack")
}

fn default_schedule_window_days() -> i64 {
    7
}

fn default_stats_window_days() -> i64 {
    30
}

fn default_max_range_days() -> i64 {
    366
}

/// Upper bound for `max_range_days`, about a century
const MAX_RANGE_LIMIT_DAYS: i64 = 36_600;

impl Config {
    /// Load configuration from `path`, falling back to defaults when it is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject window settings that cannot produce a valid range
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("schedule", self.schedule.default_window_days, self.schedule.max_range_days),
            ("stats", self.stats.default_window_days, self.stats.max_range_days),
        ];

        for (section, window, max) in windows {
            if !(1..=MAX_RANGE_LIMIT_DAYS).contains(&max) {
                return Err(Error::Config(format!(
                    "[{}] max_range_days must be between 1 and {}, got {}",
                    section, MAX_RANGE_LIMIT_DAYS, max
                )));
            }
            if window < 0 {
                return Err(Error::Config(format!(
                    "[{}] default_window_days must not be negative",
                    section
                )));
            }
            if window > max {
                return Err(Error::Config(format!(
                    "[{}] default_window_days ({}) exceeds max_range_days ({})",
                    section, window, max
                )));
            }
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("peptrack").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
