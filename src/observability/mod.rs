//! Observability and telemetry.
//!
//! Logging goes through `tracing`; metrics go through the `metrics` facade.
//! No metrics exporter is installed, so counters are no-ops unless an
//! embedding application installs a recorder.

mod logging;
mod run_context;

pub use logging::{LogFormat, LoggingConfig, normalize_level};
pub use run_context::{RunContext, RunContextGuard, current_run_id, enter_run_context};

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if logging was already initialized, the level directive
/// is invalid, or the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let filter = config.filter()?;
    let (writer, ansi) = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                    operation: "create_log_dir".to_string(),
                    cause: e.to_string(),
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::OperationFailed {
                    operation: "open_log_file".to_string(),
                    cause: format!("{}: {}", path.display(), e),
                })?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        },
        None => (
            BoxMakeWriter::new(std::io::stderr),
            std::io::stderr().is_terminal(),
        ),
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: e.to_string(),
        })?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "failed to mark observability initialized".to_string(),
        })
}

/// Installs logging as configured by [`KeeperConfig`](crate::config::KeeperConfig).
///
/// # Errors
///
/// Same as [`init`].
pub fn init_from_config(config: &crate::config::KeeperConfig, verbose: bool) -> Result<()> {
    let logging = LoggingConfig::from_level(&config.log_level, config.log_format, verbose)?
        .with_file(config.log_file.clone());
    init(&logging)
}
