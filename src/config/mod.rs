//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables. The file is looked up in this order:
//!
//! 1. An explicit path (`--config`)
//! 2. `DATASYNC_CONFIG_PATH`
//! 3. The platform config dir (`~/.config/datasync/config.toml` on Linux)
//!
//! Missing files fall back to defaults.
//!
//! ```toml
//! chunk_dir = ".datasync/chunks"
//! export_chunk_size = 1000
//! max_window_limit = 10000
//!
//! [sweep]
//! retention_hours = 24
//! daily_at = "00:00"
//!
//! [logging]
//! format = "json"
//! level = "info"
//! file = "/var/log/datasync.log"
//! ```

use crate::gc::{SweepConfig, SweepSchedule};
use crate::jobs::{DEFAULT_EXPORT_CHUNK_SIZE, DEFAULT_MAX_WINDOW_LIMIT, OrchestratorConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "DATASYNC_CONFIG_PATH";
/// Environment variable overriding `chunk_dir`.
pub const CHUNK_DIR_ENV: &str = "DATASYNC_CHUNK_DIR";
/// Environment variable overriding `[sweep] retention_hours`.
pub const RETENTION_HOURS_ENV: &str = "DATASYNC_RETENTION_HOURS";
/// Environment variable overriding `[sweep] daily_at` (`HH:MM`, UTC).
pub const SWEEP_AT_ENV: &str = "DATASYNC_SWEEP_AT";
/// Environment variable overriding `[logging] format`.
pub const LOG_FORMAT_ENV: &str = "DATASYNC_LOG_FORMAT";
/// Environment variable overriding `[logging] file`.
pub const LOG_FILE_ENV: &str = "DATASYNC_LOG_FILE";

/// `[logging]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Default filter level when no `DATASYNC_LOG`/`RUST_LOG` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Append-only log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Main configuration for datasync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSyncConfig {
    /// Root directory of the chunk store.
    pub chunk_dir: PathBuf,
    /// Rows per export window.
    pub export_chunk_size: usize,
    /// Largest accepted import window.
    pub max_window_limit: usize,
    /// Reclamation sweep settings.
    pub sweep: SweepConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Chunk store root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_dir: Option<String>,
    /// Rows per export window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_chunk_size: Option<usize>,
    /// Largest accepted import window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_window_limit: Option<usize>,
    /// Sweep section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<ConfigFileSweep>,
    /// Logging section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSettings>,
}

/// `[sweep]` section in the config file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileSweep {
    /// Retention threshold in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_hours: Option<u64>,
    /// Daily trigger time, `HH:MM` UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_at: Option<SweepSchedule>,
}

impl Default for DataSyncConfig {
    fn default() -> Self {
        Self {
            chunk_dir: PathBuf::from(".datasync/chunks"),
            export_chunk_size: DEFAULT_EXPORT_CHUNK_SIZE,
            max_window_limit: DEFAULT_MAX_WINDOW_LIMIT,
            sweep: SweepConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DataSyncConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the effective configuration: file, then environment overrides.
    ///
    /// Also loads a `.env` file from the working directory if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named config file cannot be read or
    /// parsed. A broken default-location file is skipped with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();

        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory.
    ///
    /// Returns default configuration if no usable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "datasync") else {
            return Self::default();
        };
        let path = dirs.config_dir().join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            Self::default()
        })
    }

    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(chunk_dir) = file.chunk_dir {
            config.chunk_dir = PathBuf::from(chunk_dir);
        }
        if let Some(size) = file.export_chunk_size {
            config.export_chunk_size = size;
        }
        if let Some(limit) = file.max_window_limit {
            config.max_window_limit = limit;
        }
        if let Some(sweep) = file.sweep {
            if let Some(hours) = sweep.retention_hours {
                config.sweep.retention_hours = hours;
            }
            if let Some(schedule) = sweep.daily_at {
                config.sweep.schedule = schedule;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// Invalid sweep values are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CHUNK_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.chunk_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(RETENTION_HOURS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(hours) => self.sweep.retention_hours = hours,
                Err(_) => warn!(value = %raw, "Ignoring invalid {RETENTION_HOURS_ENV}"),
            }
        }
        if let Some(raw) = lookup(SWEEP_AT_ENV) {
            match SweepSchedule::parse(&raw) {
                Ok(schedule) => self.sweep.schedule = schedule,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {SWEEP_AT_ENV}"),
            }
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            self.logging.format = Some(format);
        }
        if let Some(file) = lookup(LOG_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            self.logging.file = Some(PathBuf::from(file));
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the chunk store root.
    #[must_use]
    pub fn with_chunk_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.chunk_dir = path.into();
        self
    }

    /// Sets the export window size.
    #[must_use]
    pub const fn with_export_chunk_size(mut self, size: usize) -> Self {
        self.export_chunk_size = size;
        self
    }

    /// Orchestrator settings derived from this configuration.
    #[must_use]
    pub const fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            export_chunk_size: self.export_chunk_size,
            max_window_limit: self.max_window_limit,
        }
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        let file = ConfigFile {
            chunk_dir: Some(self.chunk_dir.display().to_string()),
            export_chunk_size: Some(self.export_chunk_size),
            max_window_limit: Some(self.max_window_limit),
            sweep: Some(ConfigFileSweep {
                retention_hours: Some(self.sweep.retention_hours),
                daily_at: Some(self.sweep.schedule),
            }),
            logging: Some(self.logging.clone()),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::OperationFailed {
            operation: "render_config".to_string(),
            cause: e.to_string(),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.export_chunk_size == 0 {
            return Err(Error::Validation(
                "export_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.max_window_limit == 0 {
            return Err(Error::Validation(
                "max_window_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
