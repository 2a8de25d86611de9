//! Catalog command handlers.
//!
//! Reports go to stdout; everything else goes through `tracing` to stderr.

use super::{CleanupArgs, PublishArgs, connect_catalog, resolve_format};
use image_keeper::catalog::ImageCatalog;
use image_keeper::config::KeeperConfig;
use image_keeper::git::GitHistory;
use image_keeper::gc::ScanOrder;
use image_keeper::models::{ImageFilter, ImageId};
use image_keeper::rendering::{render_cleanup, render_image_list, render_publication_plan};
use image_keeper::services::{
    CancellationToken, CleanupService, DeletionExecutor, PublicationService,
};

/// List command.
pub fn cmd_list(
    config: &KeeperConfig,
    name: Option<String>,
    format: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = resolve_format(format.as_deref(), config)?;
    let (catalog, owner) = connect_catalog(config)?;

    let mut filter = ImageFilter::new().with_owner(owner);
    if let Some(name) = name {
        filter = filter.with_name(name);
    }
    let images = catalog.list_images(&filter)?;
    tracing::debug!(count = images.len(), "Listed images");

    print!("{}", render_image_list(&images, format)?);
    Ok(())
}

/// Delete command.
pub fn cmd_delete(
    config: &KeeperConfig,
    ids: Vec<String>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let ids: Vec<ImageId> = ids.into_iter().map(ImageId::new).collect();
    let (catalog, _owner) = connect_catalog(config)?;

    let deleted = DeletionExecutor::new(catalog)
        .with_cancellation(cancel)
        .delete_by_ids(&ids)?;

    tracing::info!(deleted = deleted.len(), "Deletion finished");
    Ok(())
}

/// Cleanup command.
///
/// Prints the keep/delete report before any deletion happens.
pub fn cmd_cleanup(
    config: KeeperConfig,
    args: CleanupArgs,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = resolve_format(args.format.as_deref(), &config)?;
    let scan_order = match args.sort.as_deref() {
        Some(value) => value.parse::<ScanOrder>()?,
        None => config.scan_order,
    };
    let scan_depth = args.scandepth.unwrap_or(config.scan_depth);
    let dry_run = args.dry_run || config.dry_run;
    let repo = args.repo.unwrap_or_else(|| config.repo_path.clone());

    let history = GitHistory::new(repo);
    tracing::debug!(repo = %history.path().display(), scan_depth, %scan_order, "Cleanup settings");

    let (catalog, owner) = connect_catalog(&config)?;
    let service = CleanupService::new(catalog, Box::new(history))
        .with_owner(owner)
        .with_scan_depth(scan_depth)
        .with_scan_order(scan_order)
        .with_dry_run(dry_run)
        .with_cancellation(cancel);

    let mut outcome = service.plan(&args.name)?;
    print!("{}", render_cleanup(&outcome, format)?);

    if dry_run {
        tracing::info!("Dry run, nothing deleted");
    } else {
        service.execute(&mut outcome)?;
    }
    tracing::info!("{}", outcome.summary());
    Ok(())
}

/// Publish command.
pub fn cmd_publish(
    config: &KeeperConfig,
    args: PublishArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = resolve_format(args.format.as_deref(), config)?;
    let dry_run = args.dry_run || config.dry_run;

    let (catalog, owner) = connect_catalog(config)?;
    let service = PublicationService::new(catalog)
        .with_owner(owner)
        .with_protected(args.protected)
        .with_hidden(args.hidden);

    let plan = service.plan(&ImageId::new(args.id))?;
    if dry_run {
        print!("{}", render_publication_plan(&plan, format)?);
        return Ok(());
    }

    service.apply(&plan)?;
    tracing::info!("{}", plan.summary());
    Ok(())
}

