//! Retention cleanup of one CI job's images.

use super::{CancellationToken, DeletionExecutor};
use crate::catalog::ImageCatalog;
use crate::gc::{CommitRecencyIndex, RetentionClassifier, ScanOrder};
use crate::git::CommitSource;
use crate::models::{ImageFilter, ImageId, RetentionPartition};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Default number of commits considered live.
pub const DEFAULT_SCAN_DEPTH: usize = 10;

/// Converts a Duration to milliseconds, clamping to `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Result of a cleanup run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupOutcome {
    /// Image name the run was scoped to.
    pub name: String,
    /// Keep/delete partition.
    pub partition: RetentionPartition,
    /// Number of commits considered live.
    pub commits_scanned: usize,
    /// Whether deletions were skipped.
    pub dry_run: bool,
    /// Ids actually deleted (empty on a dry run).
    pub deleted: Vec<ImageId>,
    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl CleanupOutcome {
    /// Returns `true` if the run found anything to delete.
    #[must_use]
    pub fn has_deletions(&self) -> bool {
        self.partition.has_deletions()
    }

    /// Returns a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let scheduled = self.partition.for_deletion.len();
        if self.partition.is_empty() {
            return format!("No images named '{}' found", self.name);
        }
        if scheduled == 0 {
            return format!(
                "Nothing to delete: keeping all {} '{}' images ({}ms)",
                self.partition.saved.len(),
                self.name,
                self.duration_ms
            );
        }

        let action = if self.dry_run {
            format!("would delete {scheduled}")
        } else {
            format!("deleted {}", self.deleted.len())
        };
        format!(
            "Kept {} and {} of {} '{}' images ({} commits scanned, {}ms)",
            self.partition.saved.len(),
            action,
            self.partition.len(),
            self.name,
            self.commits_scanned,
            self.duration_ms
        )
    }
}

/// Lists, classifies, and deletes the images of one CI job.
pub struct CleanupService {
    catalog: Arc<dyn ImageCatalog>,
    commits: Box<dyn CommitSource>,
    owner: Option<String>,
    scan_depth: usize,
    dry_run: bool,
    classifier: RetentionClassifier,
    cancel: CancellationToken,
}

impl CleanupService {
    /// Creates a cleanup service.
    #[must_use]
    pub fn new(catalog: Arc<dyn ImageCatalog>, commits: Box<dyn CommitSource>) -> Self {
        Self {
            catalog,
            commits,
            owner: None,
            scan_depth: DEFAULT_SCAN_DEPTH,
            dry_run: false,
            classifier: RetentionClassifier::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Restricts the run to images owned by `owner`.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets how many commits count as live.
    #[must_use]
    pub const fn with_scan_depth(mut self, scan_depth: usize) -> Self {
        self.scan_depth = scan_depth;
        self
    }

    /// Reports without deleting.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the classifier's scan order.
    #[must_use]
    pub const fn with_scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.classifier = self.classifier.with_scan_order(scan_order);
        self
    }

    /// Observes `cancel` between deletions.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the retention workflow for images named `name`: [`plan`](Self::plan),
    /// then [`execute`](Self::execute) unless this is a dry run.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails or a deletion fails. A failed
    /// deletion aborts the remaining ones.
    #[instrument(
        name = "keeper.cleanup.run",
        skip(self),
        fields(
            run_id = tracing::field::Empty,
            owner = self.owner.as_deref().unwrap_or(""),
            dry_run = self.dry_run,
            scan_depth = self.scan_depth
        )
    )]
    pub fn run(&self, name: &str) -> Result<CleanupOutcome> {
        if let Some(run_id) = crate::observability::current_run_id() {
            tracing::Span::current().record("run_id", run_id.as_str());
        }

        let mut outcome = self.plan(name)?;
        if !self.dry_run {
            self.execute(&mut outcome)?;
        }
        Ok(outcome)
    }

    /// Lists and classifies the images named `name` without deleting.
    ///
    /// When no image matches, returns an empty outcome without reading the
    /// commit history.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or if the catalog or the history
    /// cannot be read.
    #[instrument(name = "keeper.cleanup.plan", skip(self), fields(scan_order = %self.classifier.scan_order()))]
    pub fn plan(&self, name: &str) -> Result<CleanupOutcome> {
        let start = Instant::now();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("image name must not be empty".to_string()));
        }

        let mut outcome = CleanupOutcome {
            name: name.to_string(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        let mut filter = ImageFilter::new().with_name(name);
        if let Some(owner) = &self.owner {
            filter = filter.with_owner(owner.clone());
        }
        let images = self.catalog.list_images(&filter)?;
        if images.is_empty() {
            info!(name, "No images found");
            outcome.duration_ms = duration_to_millis(start.elapsed());
            self.record_dry_run(&outcome);
            return Ok(outcome);
        }

        let commits = self.commits.recent_commits(self.scan_depth)?;
        debug!(images = images.len(), commits = commits.len(), "Classifying images");
        let index = CommitRecencyIndex::new(commits);
        outcome.commits_scanned = index.len();
        outcome.partition = self.classifier.classify(&images, &index);
        outcome.duration_ms = duration_to_millis(start.elapsed());

        info!(
            name,
            saved = outcome.partition.saved.len(),
            for_deletion = outcome.partition.for_deletion.len(),
            "Images classified"
        );
        self.record_dry_run(&outcome);
        Ok(outcome)
    }

    /// Deletes the images `outcome` scheduled for deletion and records them
    /// in `outcome.deleted`.
    ///
    /// # Errors
    ///
    /// Returns the first deletion error; `outcome.deleted` is left empty in
    /// that case because the catalog error is surfaced unchanged.
    #[instrument(name = "keeper.cleanup.execute", skip_all, fields(name = %outcome.name))]
    pub fn execute(&self, outcome: &mut CleanupOutcome) -> Result<()> {
        let start = Instant::now();
        outcome.dry_run = false;

        if outcome.partition.has_deletions() {
            let executor = DeletionExecutor::new(Arc::clone(&self.catalog))
                .with_cancellation(self.cancel.clone());
            outcome.deleted = executor.delete_all(&outcome.partition.deletion_ids())?;
        }

        outcome.duration_ms = outcome
            .duration_ms
            .saturating_add(duration_to_millis(start.elapsed()));
        record_run(outcome);

        info!(
            deleted = outcome.deleted.len(),
            duration_ms = outcome.duration_ms,
            "Cleanup completed"
        );
        Ok(())
    }
}

impl CleanupService {
    /// A dry run ends with the plan, so the plan counts as the run.
    fn record_dry_run(&self, outcome: &CleanupOutcome) {
        if self.dry_run {
            record_run(outcome);
        }
    }
}

fn record_run(outcome: &CleanupOutcome) {
    let dry_run = if outcome.dry_run { "true" } else { "false" };
    metrics::counter!("keeper_cleanup_runs_total", "dry_run" => dry_run).increment(1);
    metrics::histogram!("keeper_cleanup_duration_ms", "dry_run" => dry_run)
        .record(u64_to_f64(outcome.duration_ms));
}
