//! TOML configuration.
//!
//! # Responsibility
//! - Resolve the config file location and load it with defaults.
//! - Apply environment overrides and validate the result.
//!
//! # Invariants
//! - A missing config file yields `Config::default()`, not an error.
//! - Every returned `Config` has passed `Config::validate`.

use crate::logging::normalize_level;
use crate::model::task::{is_hex_color, TASK_COLORS};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DAYCLOCK_CONFIG";
pub const DB_PATH_ENV: &str = "DAYCLOCK_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "DAYCLOCK_LOG";

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "dayclock.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    NoHomeDirectory,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHomeDirectory => write!(f, "failed to determine a home directory"),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "failed to parse TOML in {}: {source}", path.display())
            }
            Self::Serialize(err) => write!(f, "failed to render config: {err}"),
            Self::Invalid(message) => write!(f, "config error: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::NoHomeDirectory | Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; `~/` is expanded, relative paths resolve against cwd.
    pub db_path: String,
    /// Insert the starter day into an empty store on open.
    pub seed_defaults: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_data_dir()
                .join(DB_FILE_NAME)
                .to_string_lossy()
                .into_owned(),
            seed_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: crate::logging::default_log_level().to_owned(),
            dir: default_data_dir()
                .join("logs")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Colors accepted for tasks.
    pub palette: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            palette: TASK_COLORS.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.db_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.db_path must not be empty".to_owned(),
            ));
        }
        if self.logging.dir.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.dir must not be empty".to_owned(),
            ));
        }
        normalize_level(&self.logging.level)
            .map_err(|msg| ConfigError::Invalid(format!("logging.level: {msg}")))?;
        if self.schedule.palette.is_empty() {
            return Err(ConfigError::Invalid(
                "schedule.palette must list at least one color".to_owned(),
            ));
        }
        if let Some(bad) = self.schedule.palette.iter().find(|c| !is_hex_color(c)) {
            return Err(ConfigError::Invalid(format!(
                "schedule.palette entry `{bad}` is not #RRGGBB"
            )));
        }
        Ok(())
    }

    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        expand_path(&self.storage.db_path)
    }

    /// Resolved log directory.
    pub fn log_dir(&self) -> PathBuf {
        expand_path(&self.logging.dir)
    }

    /// Fully resolved config as TOML text.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Overrides fields from `DAYCLOCK_*` variables provided by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(db_path) = present(DB_PATH_ENV) {
            self.storage.db_path = db_path.trim().to_owned();
        }
        if let Some(level) = present(LOG_LEVEL_ENV) {
            self.logging.level = level.trim().to_owned();
        }
    }
}

/// Config file location: `$DAYCLOCK_CONFIG`, else the platform config dir.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dirs = project_dirs().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Loads the config from the default location with process env overrides.
pub fn load() -> Result<Config, ConfigError> {
    load_from(&default_config_path()?)
}

/// Loads `path` (defaults when missing) with process env overrides.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let mut config = read_file(path)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Expands a leading `~/` and anchors relative paths at the current dir.
pub fn expand_path(input: &str) -> PathBuf {
    let trimmed = input.trim();
    let expanded = match (trimmed.strip_prefix("~/"), BaseDirs::new()) {
        (Some(rest), Some(base)) => base.home_dir().join(rest),
        _ => PathBuf::from(trimmed),
    };
    if expanded.is_absolute() {
        return expanded;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&expanded))
        .unwrap_or(expanded)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "dayclock", "dayclock")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.local/share/dayclock"))
}
