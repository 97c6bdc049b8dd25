//! Configuration management for absensi.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::attendance::Deadline;
use crate::error::{Error, Result};
use crate::model::Semester;
use crate::storage::StorageOptions;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "absensi";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "absensi.db";

/// Default on-time deadline for check-ins.
pub const DEFAULT_ON_TIME_DEADLINE: &str = "07:30";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ABSENSI_`, sections split by `__`)
/// 2. TOML config file at `~/.config/absensi/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Attendance rules.
    pub attendance: AttendanceConfig,
    /// School defaults.
    pub school: SchoolConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/absensi/absensi.db`
    pub database_path: Option<PathBuf>,
}

/// Attendance rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Latest `HH:MM` at which a check-in is still on time.
    pub on_time_deadline: String,
    /// Semester stamped on new records when none is given.
    pub default_semester: Semester,
}

/// School-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolConfig {
    /// Name used to stamp single-school data on upgrade when the database
    /// has no school info record of its own.
    pub legacy_name: Option<String>,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            on_time_deadline: DEFAULT_ON_TIME_DEADLINE.to_string(),
            default_semester: Semester::default(),
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
            .merge(Env::prefixed("ABSENSI_").split("__"));

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
        if Deadline::parse(&self.attendance.on_time_deadline).is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "on_time_deadline must be HH:MM, got '{}'",
                    self.attendance.on_time_deadline
                ),
            });
        }

        if let Some(name) = &self.school.legacy_name {
            if name.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "legacy_name cannot be blank".to_string(),
                });
            }
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

    /// The configured on-time deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeadline`] if the value is not `HH:MM`.
    pub fn deadline(&self) -> Result<Deadline> {
        Deadline::parse(&self.attendance.on_time_deadline)
    }

    /// Options for opening the database.
    #[must_use]
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            legacy_school_name: self.school.legacy_name.clone(),
        }
    }
}
