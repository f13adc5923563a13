//! Configuration management for the interactive CLI.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/interactive/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use interactive::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("invalid session settings: {0}")]
    InvalidSession(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("{0} must be a number of seconds, got {1:?}")]
    InvalidTimeout(&'static str, String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "INTERACTIVE_LOG_LEVEL";

/// Environment variable overriding the session timeout in seconds.
pub const TIMEOUT_ENV: &str = "INTERACTIVE_TIMEOUT";

/// Main configuration structure for the interactive CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub log: LogConfig,

    /// Settings for the driven session.
    pub session: SessionConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("interactive")
        .join("config.toml")
}

/// Parses a timeout given in (possibly fractional) seconds; `0` means none.
pub fn parse_timeout(source: &'static str, value: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimeout(source, value.to_string()))?;
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| ConfigError::InvalidTimeout(source, value.to_string()))
}

/// Checks that `command` is an existing path or resolves on `PATH`.
pub fn resolve_command(command: &str) -> Result<PathBuf, ConfigError> {
    let path = Path::new(command);
    if command.contains('/') {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::CommandNotFound(command.to_string()));
    }

    which::which(command).map_err(|_| ConfigError::CommandNotFound(command.to_string()))
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - INTERACTIVE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - INTERACTIVE_TIMEOUT: Override the session timeout in seconds (0 = none)
    ///
    /// Returns the variables that were applied with their values, so they
    /// can be logged once tracing is set up.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<(&'static str, String)>, ConfigError> {
        let mut applied = Vec::new();

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.is_empty() {
                self.log.level = level.clone();
                applied.push((LOG_LEVEL_ENV, level));
            }
        }

        if let Ok(timeout) = std::env::var(TIMEOUT_ENV) {
            if !timeout.is_empty() {
                self.session.timeout = parse_timeout(TIMEOUT_ENV, &timeout)?;
                applied.push((TIMEOUT_ENV, timeout));
            }
        }

        Ok(applied)
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.log.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        self.session
            .validate()
            .map_err(|e| ConfigError::InvalidSession(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
