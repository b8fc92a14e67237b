//! Configuration types and loading for stepwise.
//!
//! The main entry point is [`StepwiseConfig`], which represents the contents
//! of `.stepwise/config.yaml`. Configuration is layered with figment:
//! built-in defaults, then the YAML file, then `STEPWISE_*` environment
//! variables (`__` separates nested keys, e.g.
//! `STEPWISE_AUTOSAVE__INTERVAL_SECS=30`). [`save_config`] writes the file
//! back with serde_yaml.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use stepwise_core::ReferenceParser;
use stepwise_core::reference::DEFAULT_DATE_FORMAT;
use thiserror::Error;

/// Name of the configuration file inside the `.stepwise/` directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default database file name inside the `.stepwise/` directory.
pub const DEFAULT_DB_FILE_NAME: &str = "stepwise.db";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "STEPWISE_";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Serializing the configuration to YAML failed.
    #[error("failed to write config file: {0}")]
    WriteError(#[from] serde_yaml::Error),

    /// A layer (file or environment) could not be extracted.
    #[error("failed to load configuration: {0}")]
    ParseError(#[from] Box<figment::Error>),

    /// The `.stepwise/` directory was not found.
    #[error("no .stepwise directory found (run 'sw init' first)")]
    StepwiseDirNotFound,

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Autosave configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Seconds between timer saves while there are unsaved edits.
    #[serde(
        default = "default_interval_secs",
        rename = "interval-secs",
        alias = "interval_secs"
    )]
    pub interval_secs: u64,

    /// Whether timer saves run at all. Manual saves are unaffected.
    #[serde(default = "default_true", rename = "edit-mode", alias = "edit_mode")]
    pub edit_mode: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            edit_mode: default_true(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Reference resolution configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// chrono strftime format used for `@{today}`.
    #[serde(
        default = "default_date_format",
        rename = "date-format",
        alias = "date_format"
    )]
    pub date_format: String,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The full stepwise configuration, corresponding to `.stepwise/config.yaml`.
///
/// All fields use `serde` defaults so that a partially-specified YAML file
/// will be deserialized correctly with sensible default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StepwiseConfig {
    /// Owner recorded on new agents and templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Output JSON instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Database path override, relative to the `.stepwise/` directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,

    /// Autosave configuration.
    #[serde(default)]
    pub autosave: AutosaveConfig,

    /// Reference resolution configuration.
    #[serde(default)]
    pub references: ReferencesConfig,
}

impl StepwiseConfig {
    /// Autosave interval as a [`Duration`].
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave.interval_secs)
    }

    /// Resolves the database path for the given `.stepwise/` directory.
    pub fn db_path(&self, stepwise_dir: &Path) -> PathBuf {
        match self.db.as_deref() {
            Some(db) if !db.trim().is_empty() => stepwise_dir.join(db),
            _ => stepwise_dir.join(DEFAULT_DB_FILE_NAME),
        }
    }

    /// Builds the reference parser configured by `references.date-format`.
    pub fn reference_parser(&self) -> Result<ReferenceParser> {
        ReferenceParser::with_format(self.references.date_format.clone()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "references.date-format".into(),
                reason: e.to_string(),
            }
        })
    }

    /// Checks values that serde alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.autosave.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "autosave.interval-secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.reference_parser()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Builds the layered figment for a `.stepwise/` directory.
pub fn figment(stepwise_dir: &Path) -> Figment {
    Figment::from(Serialized::defaults(StepwiseConfig::default()))
        .merge(Yaml::file(stepwise_dir.join(CONFIG_FILE_NAME)))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["dir"]))
}

/// Loads configuration for the given `.stepwise/` directory.
///
/// A missing or empty file yields the defaults (plus any environment
/// overrides).
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if a layer holds values of the wrong
/// shape, or [`ConfigError::InvalidValue`] if validation fails.
pub fn load_config(stepwise_dir: &Path) -> Result<StepwiseConfig> {
    let config: StepwiseConfig = figment(stepwise_dir).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Saves configuration to `config.yaml` inside the given `.stepwise/`
/// directory.
///
/// The directory is created if it does not exist.
pub fn save_config(stepwise_dir: &Path, config: &StepwiseConfig) -> Result<()> {
    std::fs::create_dir_all(stepwise_dir)?;

    let config_path = stepwise_dir.join(CONFIG_FILE_NAME);
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(config_path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
