//! Configuration module for gdup.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::newtypes::RemoteId;

/// Environment variable consulted when `drive.access_token` is unset
pub const ACCESS_TOKEN_ENV: &str = "GDUP_ACCESS_TOKEN";

/// Accepted range for `workers`
pub const WORKERS_RANGE: std::ops::RangeInclusive<i64> = 1..=20;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for gdup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of concurrent upload workers, `1..=20`.
    ///
    /// Signed so that a negative value still loads and falls back to one
    /// worker instead of failing the whole file.
    pub workers: i64,
    /// Remote folder every mapping's target path is created under.
    pub target_root: String,
    /// Local directories to synchronize.
    pub directories: Vec<DirectoryMapping>,
    pub drive: DriveConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// One local directory and where it goes on the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMapping {
    /// Local source directory.
    pub source: PathBuf,
    /// Remote path below `target_root`, `/` or `\` separated.
    pub target: String,
    /// Descend into subdirectories. Accepts a boolean or `"yes"` / `"no"`.
    #[serde(default, deserialize_with = "yes_or_no")]
    pub recursive: bool,
}

/// Google Drive endpoint and credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Base URL of the metadata API.
    pub api_url: String,
    /// Base URL of the media upload API.
    pub upload_url: String,
    /// OAuth bearer token. Falls back to `GDUP_ACCESS_TOKEN` when unset.
    pub access_token: Option<String>,
}

/// Transaction log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// File the transaction log is appended to. A leading `~` is expanded.
    pub file: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

fn yes_or_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "on" => Ok(true),
            "no" | "n" | "false" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected yes/no or a boolean, got '{other}'"
            ))),
        },
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/gdup/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("gdup")
            .join("config.yaml")
    }

    /// Returns true when `workers` lies inside [`WORKERS_RANGE`].
    pub fn workers_in_range(&self) -> bool {
        WORKERS_RANGE.contains(&self.workers)
    }

    /// Worker count to actually start.
    ///
    /// Out-of-range values fall back to a single worker; callers are
    /// expected to warn when [`Config::workers_in_range`] is false.
    pub fn effective_workers(&self) -> usize {
        if self.workers_in_range() {
            usize::try_from(self.workers).unwrap_or(1)
        } else {
            1
        }
    }
}

impl DriveConfig {
    /// The configured token, or the one from `GDUP_ACCESS_TOKEN`.
    pub fn resolve_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }
}

impl AuditConfig {
    /// The log file path with a leading `~` replaced by the home directory.
    pub fn resolved_file(&self) -> PathBuf {
        expand_home(&self.file)
    }
}

/// Replaces a leading `~` component with the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            target_root: RemoteId::ROOT_ALIAS.to_string(),
            directories: Vec::new(),
            drive: DriveConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.googleapis.com/drive/v2".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v2".to_string(),
            access_token: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("gdup");
        Self {
            file: data_dir.join("transaction.log"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"directories[0].source"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. An out-of-range
    /// `workers` value is not an error (see [`Config::effective_workers`]).
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = RemoteId::new(self.target_root.clone()) {
            errors.push(ValidationError {
                field: "target_root".into(),
                message: e.to_string(),
            });
        }

        // --- directories ---
        for (i, mapping) in self.directories.iter().enumerate() {
            if mapping.source.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: format!("directories[{i}].source"),
                    message: "must not be empty".into(),
                });
            }
            if mapping.target.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("directories[{i}].target"),
                    message: "must not be empty".into(),
                });
            }
        }

        // --- drive ---
        if self.drive.api_url.trim().is_empty() {
            errors.push(ValidationError {
                field: "drive.api_url".into(),
                message: "must not be empty".into(),
            });
        }
        if self.drive.upload_url.trim().is_empty() {
            errors.push(ValidationError {
                field: "drive.upload_url".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use gdup_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .workers(8)
///     .directory(PathBuf::from("/srv/photos"), "backup/photos", true)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn workers(mut self, n: i64) -> Self {
        self.config.workers = n;
        self
    }

    pub fn target_root(mut self, id: impl Into<String>) -> Self {
        self.config.target_root = id.into();
        self
    }

    pub fn directory(mut self, source: PathBuf, target: impl Into<String>, recursive: bool) -> Self {
        self.config.directories.push(DirectoryMapping {
            source,
            target: target.into(),
            recursive,
        });
        self
    }

    // --- drive ---

    pub fn drive_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.api_url = url.into();
        self
    }

    pub fn drive_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.upload_url = url.into();
        self
    }

    pub fn drive_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.drive.access_token = Some(token.into());
        self
    }

    // --- audit ---

    pub fn audit_file(mut self, file: PathBuf) -> Self {
        self.config.audit.file = file;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
