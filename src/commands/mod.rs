//! Command handlers module.
//!
//! - `images.rs`: catalog commands (list, delete, cleanup, publish)
//! - `config.rs`: configuration display and version

mod config;
mod images;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use clap::builder::BoolishValueParser;
use image_keeper::catalog::{OpenStackCatalog, OpenStackSettings};
use image_keeper::config::KeeperConfig;
use image_keeper::rendering::ReportFormat;

pub use config::{cmd_config, cmd_version};
pub use images::{cmd_cleanup, cmd_delete, cmd_list, cmd_publish};

/// Arguments for `cleanup`.
#[derive(Args)]
pub struct CleanupArgs {
    /// Image name to clean up.
    pub name: String,

    /// Number of recent commits whose images are kept.
    #[arg(long, env = "HOUSEKEEPER_SCAN_DEPTH")]
    pub scandepth: Option<usize>,

    /// Print the plan without deleting anything.
    #[arg(long, env = "HOUSEKEEPER_DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Scan order: catalog or created-at.
    #[arg(long)]
    pub sort: Option<String>,

    /// Output format: text, json, or yaml.
    #[arg(long)]
    pub format: Option<String>,

    /// Path to the git repository (default: current directory).
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

/// Arguments for `publish`.
#[derive(Args)]
pub struct PublishArgs {
    /// Id of the image to publish.
    pub id: String,

    /// Print the plan without changing anything.
    #[arg(long, env = "HOUSEKEEPER_DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Mark the published image protected.
    #[arg(long, env = "HOUSEKEEPER_SET_PROTECTED", value_parser = BoolishValueParser::new())]
    pub protected: bool,

    /// Mark the published image hidden.
    #[arg(long, env = "HOUSEKEEPER_SET_HIDDEN", value_parser = BoolishValueParser::new())]
    pub hidden: bool,

    /// Output format: text, json, or yaml.
    #[arg(long)]
    pub format: Option<String>,
}

/// Authenticates against OpenStack using the `OS_*` environment.
///
/// Returns the catalog and the project id that owns our images.
fn connect_catalog(
    config: &KeeperConfig,
) -> Result<(Arc<OpenStackCatalog>, String), Box<dyn std::error::Error>> {
    let settings = OpenStackSettings::from_env()?;
    let catalog = OpenStackCatalog::connect(&settings, config.http)?;
    let owner = catalog.project_id().to_string();
    tracing::debug!(endpoint = catalog.endpoint(), owner = %owner, "Connected to image service");
    Ok((Arc::new(catalog), owner))
}

/// Resolves the report format: the flag wins over configuration.
fn resolve_format(
    flag: Option<&str>,
    config: &KeeperConfig,
) -> Result<ReportFormat, Box<dyn std::error::Error>> {
    match flag {
        Some(value) => Ok(value.parse()?),
        None => Ok(config.report_format),
    }
}
