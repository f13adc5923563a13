//! Per-session configuration.
//!
//! Every option that changes how a session behaves lives on
//! [`SessionConfig`] and is fixed when the session starts, so two sessions
//! in the same process never share settings.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Default capacity of the input queue.
pub const DEFAULT_INPUT_CAPACITY: usize = 1;

/// Default capacity of the output queue.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 5000;

/// Default terminator appended to every forwarded line (the Enter key).
pub const DEFAULT_LINE_TERMINATOR: &str = "\r";

/// Configuration for a single session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Kill the process if it is still running after this long.
    /// `None` (or `0` in a config file) runs until the process exits.
    #[serde(with = "timeout_secs")]
    pub timeout: Option<Duration>,

    /// Log every line read and forwarded at debug level.
    pub verbose: bool,

    /// Bytes appended to each line written to the terminal.
    pub line_terminator: String,

    /// Whether the terminal echoes typed input back to the output queue.
    /// Off by default, so output holds only what the process printed.
    pub echo: bool,

    /// Terminal height in rows.
    pub rows: u16,

    /// Terminal width in columns.
    pub cols: u16,

    /// Working directory for the process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Number of input lines that can be queued before `write` waits.
    pub input_capacity: usize,

    /// Number of output lines that can be queued before the readers wait.
    pub output_capacity: usize,

    /// Additional environment variables for the process.
    pub env: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            verbose: false,
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
            echo: false,
            rows: 24,
            cols: 80,
            cwd: None,
            input_capacity: DEFAULT_INPUT_CAPACITY,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            env: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Returns a default configuration with the given timeout.
    ///
    /// A zero duration means no timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.filter(|t| !t.is_zero()),
            ..Self::default()
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.input_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "input_capacity must be at least 1".to_string(),
            ));
        }

        if self.output_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "output_capacity must be at least 1".to_string(),
            ));
        }

        if self.rows == 0 || self.cols == 0 {
            return Err(SessionError::InvalidConfig(format!(
                "terminal size must be non-zero, got {}x{}",
                self.cols, self.rows
            )));
        }

        if self.line_terminator.is_empty() {
            return Err(SessionError::InvalidConfig(
                "line_terminator must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The effective timeout; zero durations count as none.
    pub(crate) fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

/// Timeouts are written as (possibly fractional) seconds, `0` meaning none.
mod timeout_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.map_or(0.0, |d| d.as_secs_f64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if secs == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid timeout {secs}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout, None);
        assert!(!config.verbose);
        assert_eq!(config.line_terminator, "\r");
        assert!(!config.echo);
        assert_eq!((config.cols, config.rows), (80, 24));
        assert_eq!(config.input_capacity, 1);
        assert_eq!(config.output_capacity, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_timeout_zero_is_unbounded() {
        let config = SessionConfig::with_timeout(Some(Duration::ZERO));
        assert_eq!(config.timeout, None);

        let config = SessionConfig::with_timeout(Some(Duration::from_secs(3)));
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_effective_timeout_ignores_zero() {
        let config = SessionConfig {
            timeout: Some(Duration::ZERO),
            ..SessionConfig::default()
        };
        assert_eq!(config.effective_timeout(), None);
    }

    #[test]
    fn test_validate_zero_capacity() {
        let config = SessionConfig {
            input_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));

        let config = SessionConfig {
            output_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_terminal_size() {
        let config = SessionConfig {
            rows: 0,
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("80x0"));
    }

    #[test]
    fn test_validate_empty_terminator() {
        let config = SessionConfig {
            line_terminator: String::new(),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_timeout_seconds() {
        let config: SessionConfig = toml::from_str("timeout = 1.5\necho = true").unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.echo);

        let config: SessionConfig = toml::from_str("timeout = 0").unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_from_toml_negative_timeout() {
        let result: std::result::Result<SessionConfig, _> = toml::from_str("timeout = -1.0");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = SessionConfig::with_timeout(Some(Duration::from_secs(30)));
        config.env.insert("TERM".to_string(), "dumb".to_string());
        config.cwd = Some(PathBuf::from("/tmp"));

        let text = toml::to_string(&config).unwrap();
        let parsed: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
