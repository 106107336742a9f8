//! Configuration utilities
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::{Error, Result};

/// Base trait for all configuration types
pub trait Configuration: Serialize + for<'de> Deserialize<'de> + Default {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Load configuration from a file
    fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from a string
    fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Runtime settings for the voting service and its binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Directory holding the resolution and member records
    pub data_dir: PathBuf,

    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,

    /// Directory for rolling log files; console only when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Shared token callers must present; no token check when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Attempts for a conditional resolution update before giving up
    pub max_update_retries: u32,

    /// Base backoff between conflicting update attempts, in milliseconds
    pub retry_backoff_ms: u64,

    /// Upper bound on a resolution's voting window
    pub max_duration_minutes: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_dir: None,
            access_token: None,
            max_update_retries: 5,
            retry_backoff_ms: 5,
            max_duration_minutes: 525_600,
        }
    }
}

impl Configuration for VotingConfig {
    fn validate(&self) -> Result<()> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::configuration(format!(
                    "Invalid log level: {}",
                    self.log_level
                )))
            }
        }

        if self.max_update_retries == 0 {
            return Err(Error::configuration("max_update_retries must be at least 1"));
        }

        if self.max_duration_minutes == 0 {
            return Err(Error::configuration("max_duration_minutes must be at least 1"));
        }

        if let Some(token) = &self.access_token {
            if token.trim().is_empty() {
                return Err(Error::configuration("access_token cannot be blank"));
            }
        }

        Ok(())
    }
}

impl VotingConfig {
    /// Apply `COOPVOTE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("COOPVOTE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("COOPVOTE_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }

        if let Some(dir) = lookup("COOPVOTE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }

        if let Some(token) = lookup("COOPVOTE_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }

        if let Some(retries) = lookup("COOPVOTE_MAX_UPDATE_RETRIES") {
            self.max_update_retries = retries.parse().map_err(|_| {
                Error::configuration(format!("Invalid COOPVOTE_MAX_UPDATE_RETRIES: {}", retries))
            })?;
        }

        debug!(data_dir = %self.data_dir.display(), "applied environment overrides");
        self.validate()
    }

    /// Create the data and log directories when missing
    pub fn ensure_directories(&self) -> Result<()> {
        ensure_directory(&self.data_dir)?;
        if let Some(dir) = &self.log_dir {
            ensure_directory(dir)?;
        }
        Ok(())
    }
}

fn ensure_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            Error::configuration(format!(
                "Failed to create directory '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    Ok(())
}
