//! Runtime configuration for the store and logging.
//!
//! # Responsibility
//! - Resolve data-file and logging settings from defaults and environment.
//!
//! # Invariants
//! - Blank environment values count as unset.
//! - Nothing here touches the file system; `StoreConfig::open` only builds
//!   the repository handle.

use crate::logging::default_log_level;
use crate::repo::measurement_repo::CsvMeasurementRepository;
use crate::validation::ValidationPolicy;
use std::path::PathBuf;

pub const DEFAULT_DATA_FILE_NAME: &str = "circadian_data.csv";
pub const DATA_PATH_ENV: &str = "CIRCADIAN_DATA_PATH";
pub const LOG_LEVEL_ENV: &str = "CIRCADIAN_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "CIRCADIAN_LOG_DIR";

/// Data store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the CSV data file.
    pub data_path: PathBuf,
    pub policy: ValidationPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_FILE_NAME),
            policy: ValidationPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Reads `CIRCADIAN_DATA_PATH` over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = non_blank(lookup(DATA_PATH_ENV)) {
            config.data_path = PathBuf::from(path);
        }
        config
    }

    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }

    /// Builds the CSV repository for this configuration.
    pub fn open(&self) -> CsvMeasurementRepository {
        CsvMeasurementRepository::with_policy(self.data_path.clone(), self.policy)
    }
}

/// Logging settings.
///
/// `log_dir` of `None` means file logging stays off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = non_blank(lookup(LOG_LEVEL_ENV)) {
            config.level = level;
        }
        config.log_dir = non_blank(lookup(LOG_DIR_ENV)).map(PathBuf::from);
        config
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
