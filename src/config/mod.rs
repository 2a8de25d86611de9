//! Configuration management.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `HOUSEKEEPER_*` environment variables. Command-line flags are applied on
//! top by the binary.
//!
//! ```toml
//! scan_depth = 20
//! scan_order = "created-at"
//! log_level = "debug"
//! log_format = "json"
//! repo_path = "/srv/ci/checkout"
//! report_format = "yaml"
//!
//! [http]
//! timeout_ms = 30000
//! ```

use crate::catalog::HttpSettings;
use crate::gc::ScanOrder;
use crate::observability::{LogFormat, normalize_level};
use crate::rendering::ReportFormat;
use crate::services::DEFAULT_SCAN_DEPTH;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir.
const APP_DIR: &str = "image-keeper";

/// Main configuration for image-keeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Number of recent commits considered live.
    pub scan_depth: usize,
    /// Report without deleting.
    pub dry_run: bool,
    /// Log level name.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Optional log file; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Classifier scan order.
    pub scan_order: ScanOrder,
    /// Repository whose history decides which commits are live.
    pub repo_path: PathBuf,
    /// Report output format.
    pub report_format: ReportFormat,
    /// Catalog HTTP timeouts.
    pub http: HttpSettings,
    /// File the configuration was loaded from, if any.
    pub source: Option<PathBuf>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            scan_depth: DEFAULT_SCAN_DEPTH,
            dry_run: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
            scan_order: ScanOrder::Catalog,
            repo_path: PathBuf::from("."),
            report_format: ReportFormat::Text,
            http: HttpSettings::default(),
            source: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Scan depth.
    pub scan_depth: Option<usize>,
    /// Dry run.
    pub dry_run: Option<bool>,
    /// Log level.
    pub log_level: Option<String>,
    /// Log format.
    pub log_format: Option<String>,
    /// Log file.
    pub log_file: Option<String>,
    /// Scan order.
    pub scan_order: Option<String>,
    /// Repository path.
    pub repo_path: Option<String>,
    /// Report format.
    pub report_format: Option<String>,
    /// HTTP section.
    pub http: Option<ConfigFileHttp>,
}

/// HTTP section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHttp {
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

impl KeeperConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the file at `path` (or the default location), then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default()?,
        };
        config.with_env_overrides()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let mut config = Self::from_config_file(file)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Loads `<config_dir>/image-keeper/config.toml` if it exists.
    ///
    /// Returns the defaults when no file is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let path = base_dirs.config_dir().join(APP_DIR).join("config.toml");
        if path.exists() {
            return Self::load_from_file(&path);
        }
        Ok(Self::default())
    }

    /// Converts a `ConfigFile` to `KeeperConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(scan_depth) = file.scan_depth {
            config.scan_depth = scan_depth;
        }
        if let Some(dry_run) = file.dry_run {
            config.dry_run = dry_run;
        }
        if let Some(level) = file.log_level {
            config.log_level = normalize_level(&level)?.to_string();
        }
        if let Some(format) = file.log_format {
            config.log_format = format.parse()?;
        }
        if let Some(log_file) = file.log_file {
            config.log_file = Some(PathBuf::from(log_file));
        }
        if let Some(order) = file.scan_order {
            config.scan_order = order.parse()?;
        }
        if let Some(repo_path) = file.repo_path {
            config.repo_path = PathBuf::from(repo_path);
        }
        if let Some(format) = file.report_format {
            config.report_format = format.parse()?;
        }
        if let Some(http) = file.http {
            if let Some(timeout_ms) = http.timeout_ms {
                config.http.timeout_ms = timeout_ms;
            }
            if let Some(connect_timeout_ms) = http.connect_timeout_ms {
                config.http.connect_timeout_ms = connect_timeout_ms;
            }
        }

        Ok(config)
    }

    /// Applies `HOUSEKEEPER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds an invalid value.
    pub fn with_env_overrides(self) -> Result<Self> {
        let mut config = self.with_overrides(|key| std::env::var(key).ok())?;
        config.http = config.http.with_env_overrides();
        Ok(config)
    }

    /// Applies overrides read through `lookup`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(v) = get("HOUSEKEEPER_SCAN_DEPTH") {
            self.scan_depth = v.trim().parse().map_err(|_| {
                Error::Config(format!("HOUSEKEEPER_SCAN_DEPTH must be a number, got '{v}'"))
            })?;
        }
        if let Some(v) = get("HOUSEKEEPER_DRY_RUN") {
            self.dry_run = parse_bool("HOUSEKEEPER_DRY_RUN", &v)?;
        }
        if let Some(v) = get("HOUSEKEEPER_LOG_LEVEL") {
            self.log_level = normalize_level(&v)?.to_string();
        }
        if let Some(v) = get("HOUSEKEEPER_LOG_FORMAT") {
            self.log_format = v.parse()?;
        }
        if let Some(v) = get("HOUSEKEEPER_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOUSEKEEPER_SCAN_ORDER") {
            self.scan_order = v.parse()?;
        }
        if let Some(v) = get("HOUSEKEEPER_REPO_PATH") {
            self.repo_path = PathBuf::from(v);
        }
        if let Some(v) = get("HOUSEKEEPER_REPORT_FORMAT") {
            self.report_format = v.parse()?;
        }

        Ok(self)
    }

    /// Key/value view of the effective settings, for display.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "source",
                self.source
                    .as_ref()
                    .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string()),
            ),
            ("scan_depth", self.scan_depth.to_string()),
            ("dry_run", self.dry_run.to_string()),
            ("scan_order", self.scan_order.to_string()),
            ("repo_path", self.repo_path.display().to_string()),
            ("report_format", self.report_format.to_string()),
            ("log_level", self.log_level.clone()),
            ("log_format", self.log_format.to_string()),
            (
                "log_file",
                self.log_file
                    .as_ref()
                    .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string()),
            ),
            ("http.timeout_ms", self.http.timeout_ms.to_string()),
            (
                "http.connect_timeout_ms",
                self.http.connect_timeout_ms.to_string(),
            ),
        ]
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
