//! Structured logging configuration.

use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the format as a config string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!(
                "unknown log format '{other}' (expected 'pretty' or 'json')"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging setup for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the config from a level name, as accepted by `--loglevel`.
    ///
    /// `verbose` forces `debug`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown level name.
    pub fn from_level(level: &str, format: LogFormat, verbose: bool) -> Result<Self> {
        let level = if verbose {
            "debug"
        } else {
            normalize_level(level)?
        };
        Ok(Self {
            format,
            level: level.to_string(),
            file: None,
        })
    }

    /// Sets the log file.
    #[must_use]
    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    /// Builds the event filter. `RUST_LOG` wins over the configured level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured directive is invalid.
    pub fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level)
            .map_err(|e| Error::Config(format!("invalid log level '{}': {e}", self.level)))
    }
}

/// Maps level names, including the aliases older tooling accepts, to a
/// `tracing` level.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unknown level name.
pub fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "" | "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "fatal" | "panic" => Ok("error"),
        "off" => Ok("off"),
        other => Err(Error::Config(format!("not a valid log level: '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("debug", "debug" ; "debug")]
    #[test_case("INFO", "info" ; "uppercase")]
    #[test_case("warning", "warn" ; "warning alias")]
    #[test_case("fatal", "error" ; "fatal alias")]
    #[test_case("", "info" ; "empty")]
    fn test_normalize_level(input: &str, expected: &str) {
        assert_eq!(normalize_level(input).unwrap(), expected);
    }

    #[test]
    fn test_normalize_level_rejects_unknown() {
        assert!(normalize_level("chatty").is_err());
    }

    #[test]
    fn test_from_level_verbose_wins() {
        let config = LoggingConfig::from_level("error", LogFormat::Json, true).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
