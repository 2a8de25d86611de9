//! # Image Keeper
//!
//! Housekeeping for virtual-machine images built by a CI pipeline.
//!
//! Image Keeper decides which images in an OpenStack image catalog are safe
//! to delete by correlating image tags with the most recent commits of the
//! local git repository. Every public image survives, as does the newest
//! image overall and the newest image tagged with one of the recent
//! commits. Everything else is scheduled for deletion.
//!
//! ## Features
//!
//! - Deterministic keep/delete partition of an image collection
//! - Commit recency ranking read straight from the repository with `git2`
//! - OpenStack Glance v2 catalog client (Keystone v3 password auth)
//! - Dry-run reports in text, JSON, or YAML
//! - Image publication with automatic demotion of same-name siblings
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use image_keeper::gc::{CommitRecencyIndex, RetentionClassifier};
//! use image_keeper::models::{Image, Visibility};
//!
//! let now = Utc::now();
//! let images = vec![
//!     Image::new("a", now).with_tags(["c0"]),
//!     Image::new("b", now - Duration::hours(1)).with_tags(["c1"]),
//!     Image::new("base", now - Duration::days(30)).with_visibility(Visibility::Public),
//! ];
//! let index = CommitRecencyIndex::new(["c0", "c1"]);
//!
//! let partition = RetentionClassifier::new().classify(&images, &index);
//! assert!(partition.is_saved(&"a".into()));
//! assert!(partition.is_saved(&"base".into()));
//! assert!(partition.is_scheduled_for_deletion(&"b".into()));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod catalog;
pub mod config;
pub mod gc;
pub mod git;
pub mod models;
pub mod observability;
pub mod rendering;
pub mod services;

// Re-exports for convenience
pub use catalog::{ImageCatalog, InMemoryCatalog, OpenStackCatalog};
pub use config::KeeperConfig;
pub use gc::{CommitRecencyIndex, RetentionClassifier, ScanOrder};
pub use git::{CommitSource, GitHistory, StaticCommits};
pub use models::{Image, ImageFilter, ImageId, ImageUpdate, RetentionPartition, Visibility};
pub use services::{
    CancellationToken, CleanupOutcome, CleanupService, DeletionExecutor, PublicationPlan,
    PublicationService,
};

/// Error type for image keeper operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing image name or id, malformed flag values |
/// | `OperationFailed` | Local I/O fails, response bodies cannot be decoded |
/// | `Catalog` | The image catalog rejects a request or is unreachable |
/// | `Git` | The repository cannot be opened or walked |
/// | `Config` | The configuration file cannot be read or parsed |
/// | `Cancelled` | The operator interrupted a deletion batch |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - `cleanup` is called without an image name
    /// - `delete` or `publish` is called without an image id
    /// - A scan order or report format string is not recognised
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A request against the image catalog failed.
    ///
    /// `status` is the HTTP status code when the catalog answered at all.
    #[error("catalog operation '{operation}' failed{}: {cause}", status_suffix(.status))]
    Catalog {
        /// The catalog operation that failed.
        operation: String,
        /// HTTP status returned by the catalog, if any.
        status: Option<u16>,
        /// The underlying cause.
        cause: String,
    },

    /// Reading the repository history failed.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was cancelled before it completed.
    ///
    /// Carries the number of deletions that were issued before the
    /// cancellation was observed.
    #[error("cancelled after {completed} deletion(s)")]
    Cancelled {
        /// Deletions already issued when the cancellation was observed.
        completed: usize,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Result type alias for image keeper operations.
pub type Result<T> = std::result::Result<T, Error>;
