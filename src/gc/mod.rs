//! Image retention.
//!
//! Decides which images of one CI job must be kept and which are safe to
//! delete, given the images listed by the catalog and the most recent
//! commits of the repository that produced them.
//!
//! # Overview
//!
//! Public images are always kept. Among private images the newest one is
//! kept, plus one *commit representative*: the newest image tagged with a
//! recent commit. Everything else goes to the delete set.
//!
//! Classification is pure. It never touches the catalog, so a dry run and a
//! real run classify identically.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use image_keeper::gc::{CommitRecencyIndex, RetentionClassifier, ScanOrder};
//! use image_keeper::models::Image;
//!
//! let images = vec![Image::new("a", Utc::now()).with_tags(["c0"])];
//! let index = CommitRecencyIndex::new(["c0"]);
//!
//! let classifier = RetentionClassifier::new().with_scan_order(ScanOrder::CreatedAt);
//! let partition = classifier.classify(&images, &index);
//! assert!(!partition.has_deletions());
//! ```

mod recency;
mod retention;

pub use recency::CommitRecencyIndex;
pub use retention::{RetentionClassifier, ScanOrder};
