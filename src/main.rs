//! Binary entry point for image-keeper.
//!
//! This binary provides the CLI for housekeeping CI-built OpenStack images.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    CleanupArgs, PublishArgs, cmd_cleanup, cmd_config, cmd_delete, cmd_list, cmd_publish,
    cmd_version,
};
use image_keeper::config::KeeperConfig;
use image_keeper::observability::{self, RunContext, enter_run_context, normalize_level};
use image_keeper::services::CancellationToken;
use std::path::PathBuf;
use std::process::ExitCode;

/// Image management for OpenStack: keeps the images that matter and
/// deletes the rest.
#[derive(Parser)]
#[command(name = "image-keeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "HOUSEKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "HOUSEKEEPER_LOG_LEVEL")]
    loglevel: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List images owned by the current project.
    #[command(visible_alias = "ls")]
    List {
        /// Only list images with this exact name.
        #[arg(long)]
        name: Option<String>,

        /// Output format: text, json, or yaml.
        #[arg(long)]
        format: Option<String>,
    },

    /// Delete images by id, stopping at the first failure.
    #[command(visible_alias = "del")]
    Delete {
        /// Image ids to delete.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete superseded images with the given name.
    Cleanup(CleanupArgs),

    /// Make an image public and demote the other images with its name.
    Publish(PublishArgs),

    /// Show the effective configuration.
    Config,

    /// Show version.
    #[command(visible_alias = "ver")]
    Version,
}

fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match KeeperConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Some(level) = cli.loglevel.as_deref() {
        match normalize_level(level) {
            Ok(level) => config.log_level = level.to_string(),
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            },
        }
    }

    if let Err(e) = observability::init_from_config(&config, cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    let _run = enter_run_context(RunContext::new());
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);

    match run_command(cli, config, cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Cancels pending deletions on the first Ctrl-C and exits on the second.
fn install_interrupt_handler(cancel: &CancellationToken) {
    let token = cancel.clone();
    let result = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        token.cancel();
        tracing::warn!("Interrupt received, stopping after the current request");
    });
    if let Err(e) = result {
        tracing::warn!("Failed to install interrupt handler: {e}");
    }
}

/// Runs the selected command.
fn run_command(
    cli: Cli,
    config: KeeperConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::List { name, format } => cmd_list(&config, name, format),
        Commands::Delete { ids } => cmd_delete(&config, ids, cancel),
        Commands::Cleanup(args) => cmd_cleanup(config, args, cancel),
        Commands::Publish(args) => cmd_publish(&config, args),
        Commands::Config => cmd_config(&config),
        Commands::Version => cmd_version(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_flags_accept_numeric_and_word_env_values() {
        // SAFETY: no other test in this binary reads these variables
        unsafe {
            std::env::set_var("HOUSEKEEPER_DRY_RUN", "1");
            std::env::set_var("HOUSEKEEPER_SET_PROTECTED", "yes");
            std::env::set_var("HOUSEKEEPER_SET_HIDDEN", "0");
        }

        let cleanup = Cli::try_parse_from(["image-keeper", "cleanup", "runner"]);
        let publish = Cli::try_parse_from(["image-keeper", "publish", "abc"]);
        let publish_hidden = Cli::try_parse_from(["image-keeper", "publish", "abc", "--hidden"]);

        // SAFETY: see above
        unsafe {
            std::env::remove_var("HOUSEKEEPER_DRY_RUN");
            std::env::remove_var("HOUSEKEEPER_SET_PROTECTED");
            std::env::remove_var("HOUSEKEEPER_SET_HIDDEN");
        }

        assert!(matches!(
            cleanup.unwrap().command,
            Commands::Cleanup(ref args) if args.dry_run && args.name == "runner"
        ));
        assert!(matches!(
            publish.unwrap().command,
            Commands::Publish(ref args) if args.dry_run && args.protected && !args.hidden
        ));
        assert!(matches!(
            publish_hidden.unwrap().command,
            Commands::Publish(ref args) if args.hidden
        ));
    }

    #[test]
    fn test_command_aliases() {
        assert!(matches!(
            Cli::try_parse_from(["image-keeper", "ls"]).unwrap().command,
            Commands::List { .. }
        ));
        assert!(matches!(
            Cli::try_parse_from(["image-keeper", "del", "a", "b"]).unwrap().command,
            Commands::Delete { ref ids } if ids.len() == 2
        ));
        assert!(matches!(
            Cli::try_parse_from(["image-keeper", "ver"]).unwrap().command,
            Commands::Version
        ));
    }
}
