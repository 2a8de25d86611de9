//! Retention classifier implementation.
//!
//! Splits an image collection into the images that must be kept and the
//! images that are safe to delete.
//!
//! # Rules
//!
//! The classifier makes a single pass over the images in scan order:
//!
//! 1. Public images are always kept.
//! 2. The newest private image seen so far (the *global latest*) is kept.
//!    Older private images are scheduled for deletion; images created at the
//!    same instant as the global latest are kept alongside it.
//! 3. Among private images tagged with a live commit, a single
//!    *representative* is kept: the newest one, ties broken by the recency
//!    of the matching commit. Images tagged with equally recent commits at
//!    the same instant are kept together.
//!
//! An image held by either slot is never deleted while it holds the slot,
//! so an image displaced from one slot survives as long as the other slot
//! still holds it. Keeping always wins over scheduling: inserting an image
//! into the keep set removes it from the delete set.
//!
//! In [`ScanOrder::Catalog`] the result can depend on listing order. Peers
//! tied with the representative are not held by a slot, so a newer image
//! displacing the global latest deletes them while the representative
//! itself survives. Listed the other way round, the same peers are kept.
//! Use [`ScanOrder::CreatedAt`] when a stable result matters.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use image_keeper::gc::{CommitRecencyIndex, RetentionClassifier};
//! use image_keeper::models::Image;
//!
//! let now = Utc::now();
//! let images = vec![
//!     Image::new("a", now).with_tags(["c0", "master"]),
//!     Image::new("b", now - Duration::hours(1)).with_tags(["c1", "master"]),
//!     Image::new("c", now - Duration::hours(3)).with_tags(["c2", "master"]),
//! ];
//! let index = CommitRecencyIndex::new(["c0", "c1", "c2"]);
//!
//! let partition = RetentionClassifier::new().classify(&images, &index);
//! assert_eq!(partition.saved_ids(), vec!["a".into()]);
//! assert_eq!(partition.deletion_ids(), vec!["b".into(), "c".into()]);
//! ```

use super::CommitRecencyIndex;
use crate::models::{Image, ImageId, RetentionPartition};
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Order in which the classifier visits images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// The order the catalog listed the images in.
    #[default]
    Catalog,
    /// Oldest first by `created_at`, ties by id.
    CreatedAt,
}

impl ScanOrder {
    /// Returns the scan order as a config string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::CreatedAt => "created-at",
        }
    }
}

impl FromStr for ScanOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "catalog" | "native" => Ok(Self::Catalog),
            "created-at" | "created_at" | "created" => Ok(Self::CreatedAt),
            other => Err(Error::InvalidInput(format!(
                "unknown scan order '{other}' (expected 'catalog' or 'created-at')"
            ))),
        }
    }
}

impl fmt::Display for ScanOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits image collections into keep and delete sets.
///
/// The classifier itself holds no run state; every call to
/// [`classify`](Self::classify) owns a fresh state, so one classifier can be
/// shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionClassifier {
    scan_order: ScanOrder,
}

impl RetentionClassifier {
    /// Creates a classifier that scans in catalog order.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scan_order: ScanOrder::Catalog,
        }
    }

    /// Sets the scan order.
    #[must_use]
    pub const fn with_scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.scan_order = scan_order;
        self
    }

    /// Returns the configured scan order.
    #[must_use]
    pub const fn scan_order(&self) -> ScanOrder {
        self.scan_order
    }

    /// Computes the keep/delete partition of `images`.
    ///
    /// Never fails: any input, including an empty collection or an empty
    /// recency index, yields a partition that covers every input id exactly
    /// once.
    #[instrument(
        name = "keeper.gc.classify",
        skip_all,
        fields(
            images = images.len(),
            commits = index.len(),
            scan_order = %self.scan_order
        )
    )]
    pub fn classify(&self, images: &[Image], index: &CommitRecencyIndex) -> RetentionPartition {
        let mut ordered: Vec<&Image> = images.iter().collect();
        if self.scan_order == ScanOrder::CreatedAt {
            ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        }

        let mut state = ClassificationState::default();
        for (step, image) in ordered.into_iter().enumerate() {
            state.visit(step, image, index);
        }

        let partition = state.into_partition();

        metrics::counter!("keeper_images_classified_total").increment(images.len() as u64);
        metrics::gauge!("keeper_images_scheduled_for_deletion")
            .set(usize_to_f64(partition.for_deletion.len()));

        debug!(
            saved = partition.saved.len(),
            for_deletion = partition.for_deletion.len(),
            "Classification finished"
        );

        partition
    }
}

/// Converts usize to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn usize_to_f64(value: usize) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// An image holding a slot, plus the images kept alongside it as ties.
#[derive(Debug)]
struct Slot {
    image: Image,
    peers: Vec<ImageId>,
}

impl Slot {
    fn new(image: &Image) -> Self {
        Self {
            image: image.clone(),
            peers: Vec::new(),
        }
    }

    fn holds(&self, id: &ImageId) -> bool {
        &self.image.id == id
    }

    /// Holder first, then peers.
    fn into_ids(self) -> impl Iterator<Item = ImageId> {
        std::iter::once(self.image.id).chain(self.peers)
    }
}

/// The commit representative and the rank of its decisive tag.
#[derive(Debug)]
struct Representative {
    slot: Slot,
    rank: usize,
}

/// State of one classification run.
#[derive(Debug, Default)]
struct ClassificationState {
    saved: BTreeMap<ImageId, Image>,
    for_deletion: BTreeMap<ImageId, Image>,
    global_latest: Option<Slot>,
    representative: Option<Representative>,
}

impl ClassificationState {
    fn visit(&mut self, step: usize, image: &Image, index: &CommitRecencyIndex) {
        if image.is_public() {
            debug!(step, image_id = %image.id, "Keeping public image");
            self.keep(image);
            return;
        }

        self.track_global_latest(step, image);
        self.match_commit_tags(step, image, index);
    }

    fn track_global_latest(&mut self, step: usize, image: &Image) {
        let ordering = self
            .global_latest
            .as_ref()
            .map(|latest| image.created_at.cmp(&latest.image.created_at));

        match ordering {
            None => {
                debug!(step, image_id = %image.id, "Latest image initialized");
                self.global_latest = Some(Slot::new(image));
                self.keep(image);
            },
            Some(Ordering::Greater) => {
                let previous = self.global_latest.replace(Slot::new(image));
                self.keep(image);
                debug!(step, image_id = %image.id, "Newer latest image");
                if let Some(previous) = previous {
                    for id in previous.into_ids() {
                        self.schedule_by_id(&id);
                    }
                }
            },
            Some(Ordering::Less) => {
                debug!(step, image_id = %image.id, "Older than latest image");
                self.schedule(image);
            },
            Some(Ordering::Equal) => {
                if let Some(previous) = self.global_latest.take() {
                    let mut slot = Slot::new(image);
                    if !previous.holds(&image.id) {
                        slot.peers = previous.into_ids().collect();
                    }
                    self.global_latest = Some(slot);
                }
                debug!(step, image_id = %image.id, "Latest image tied");
                self.keep(image);
            },
        }
    }

    fn match_commit_tags(&mut self, step: usize, image: &Image, index: &CommitRecencyIndex) {
        let Some((tag, rank)) = index.best_match(&image.tags) else {
            return;
        };

        let Some(current) = self.representative.as_ref() else {
            debug!(step, image_id = %image.id, tag, rank, "Commit representative initialized");
            self.representative = Some(Representative {
                slot: Slot::new(image),
                rank,
            });
            self.keep(image);
            return;
        };

        if current.slot.holds(&image.id) {
            return;
        }
        let (current_created_at, current_rank) = (current.slot.image.created_at, current.rank);

        match image.created_at.cmp(&current_created_at) {
            Ordering::Greater => {
                debug!(step, image_id = %image.id, tag, "Newer commit representative");
                self.replace_representative(image, rank);
            },
            Ordering::Less => {
                debug!(step, image_id = %image.id, tag, "Older than commit representative");
                self.schedule(image);
            },
            Ordering::Equal => match rank.cmp(&current_rank) {
                Ordering::Less => {
                    debug!(step, image_id = %image.id, tag, rank, "More recent commit wins tie");
                    self.replace_representative(image, rank);
                },
                Ordering::Greater => {
                    debug!(step, image_id = %image.id, tag, rank, "Less recent commit loses tie");
                    self.lose_tie_break(image);
                },
                Ordering::Equal => {
                    debug!(step, image_id = %image.id, tag, rank, "Commit representative tied");
                    if let Some(representative) = self.representative.as_mut() {
                        representative.slot.peers.push(image.id.clone());
                    }
                    self.keep(image);
                },
            },
        }
    }

    fn replace_representative(&mut self, image: &Image, rank: usize) {
        let previous = self.representative.replace(Representative {
            slot: Slot::new(image),
            rank,
        });
        self.keep(image);
        if let Some(previous) = previous {
            for id in previous.slot.into_ids() {
                self.schedule_by_id(&id);
            }
        }
    }

    /// Deletes an image that lost a same-instant tie-break.
    ///
    /// If the loser holds the latest slot, the slot passes to the
    /// representative, which was created at the same instant.
    fn lose_tie_break(&mut self, image: &Image) {
        let winner = self
            .representative
            .as_ref()
            .map(|representative| representative.slot.image.clone());

        if let (Some(latest), Some(winner)) = (self.global_latest.as_mut(), winner) {
            if latest.holds(&image.id) {
                latest.peers.retain(|peer| peer != &winner.id);
                latest.image = winner;
            }
        }

        self.schedule(image);
    }

    fn is_protected(&self, id: &ImageId) -> bool {
        self.global_latest.as_ref().is_some_and(|slot| slot.holds(id))
            || self
                .representative
                .as_ref()
                .is_some_and(|representative| representative.slot.holds(id))
    }

    fn keep(&mut self, image: &Image) {
        self.for_deletion.remove(&image.id);
        self.saved.insert(image.id.clone(), image.clone());
    }

    fn schedule(&mut self, image: &Image) {
        if self.is_protected(&image.id) {
            return;
        }
        self.saved.remove(&image.id);
        self.for_deletion.insert(image.id.clone(), image.clone());
    }

    /// Moves an already kept image to the delete set.
    fn schedule_by_id(&mut self, id: &ImageId) {
        if self.is_protected(id) {
            return;
        }
        if let Some(image) = self.saved.remove(id) {
            debug!(image_id = %id, "Superseded image scheduled for deletion");
            self.for_deletion.insert(id.clone(), image);
        }
    }

    fn into_partition(self) -> RetentionPartition {
        RetentionPartition {
            saved: self.saved,
            for_deletion: self.for_deletion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use chrono::{DateTime, Duration, Utc};

    fn commit_list() -> Vec<&'static str> {
        vec![
            "ad6fed9464ef6f47b2d89ab856090d25c898d259",
            "f8b453a8b9dd6fd431577a47ec48f4ecf1500689",
            "26190eb145dca8fbb23bcd9967456a211545d459",
            "f67e14ac89404e564e856bc5c0e5f9f3c5608e16",
            "24a2165c150973fd87bc52633ecc2e6168a010b6",
            "5be8b85f8a27040845190b4e9ee5a7dd06222ab5",
            "9cc699a355a76df530a34be856d1418e52b3e6cd",
        ]
    }

    fn private(id: &str, created_at: DateTime<Utc>, tags: &[&str]) -> Image {
        Image::new(id, created_at).with_tags(tags.iter().copied())
    }

    fn classify(images: &[Image], commits: &[&str]) -> RetentionPartition {
        RetentionClassifier::new().classify(images, &CommitRecencyIndex::new(commits.iter().copied()))
    }

    #[test]
    fn test_filter_ok() {
        let commits = commit_list();
        let now = Utc::now();
        let images = vec![
            private("b9551daf", now, &[commits[0], "master"]),
            private("a66e2ab7", now - Duration::hours(1), &[commits[1], "master"]),
            private("04f24cb4", now - Duration::hours(3), &[commits[2], "master"]),
        ];

        let partition = classify(&images, &commits);

        assert!(partition.is_saved(&images[0].id));
        assert!(!partition.is_scheduled_for_deletion(&images[0].id));
        assert!(partition.is_scheduled_for_deletion(&images[1].id));
        assert!(partition.is_scheduled_for_deletion(&images[2].id));
        assert!(partition.covers_exactly(&images));
    }

    #[test]
    fn test_filter_public() {
        let commits = commit_list();
        let now = Utc::now();
        let images = vec![
            private("e6637019", now, &[commits[0], "master"]),
            private("5beb9780", now - Duration::hours(1), &[commits[1], "master"])
                .with_visibility(Visibility::Public),
            private("cf03fca9", now - Duration::hours(3), &[]).with_visibility(Visibility::Public),
        ];

        let partition = classify(&images, &commits);

        for image in &images {
            assert!(partition.is_saved(&image.id));
            assert!(!partition.is_scheduled_for_deletion(&image.id));
        }
    }

    #[test]
    fn test_filter_by_commit_in_same_time() {
        let commits = commit_list();
        let same_time = Utc::now();
        let images = vec![
            private("597c8284", same_time - Duration::hours(3), &[commits[0], "master"]),
            private("bef78610", same_time, &[commits[0], "master"]),
            private("5427dbb9", same_time, &[commits[1], "master"]),
        ];

        let partition = classify(&images, &commits);

        assert!(partition.is_saved(&images[1].id));
        assert!(!partition.is_scheduled_for_deletion(&images[1].id));
        assert!(partition.is_scheduled_for_deletion(&images[0].id));
        assert!(partition.is_scheduled_for_deletion(&images[2].id));
        assert!(partition.covers_exactly(&images));
    }

    #[test]
    fn test_empty_input() {
        let partition = classify(&[], &commit_list());
        assert!(partition.is_empty());
    }

    #[test]
    fn test_empty_commit_list_keeps_only_latest() {
        let now = Utc::now();
        let images = vec![
            private("old", now - Duration::hours(2), &["c0"]),
            private("new", now, &["c1"]),
            private("mid", now - Duration::hours(1), &["c2"]),
        ];

        let partition = classify(&images, &[]);

        assert_eq!(partition.saved_ids(), vec![ImageId::new("new")]);
        assert_eq!(partition.for_deletion.len(), 2);
    }

    #[test]
    fn test_public_and_untagged_private_are_both_kept() {
        let now = Utc::now();
        let images = vec![
            private("pub", now - Duration::days(3), &[]).with_visibility(Visibility::Public),
            private("priv", now - Duration::days(5), &[]),
        ];

        let partition = classify(&images, &commit_list());

        assert!(partition.is_saved(&ImageId::new("pub")));
        assert!(partition.is_saved(&ImageId::new("priv")));
        assert!(!partition.has_deletions());
    }

    #[test]
    fn test_tagged_and_untagged_at_same_instant_are_kept_in_either_order() {
        let now = Utc::now();
        let tagged = private("tagged", now, &["c0"]);
        let untagged = private("untagged", now, &["nightly"]);

        for images in [
            vec![tagged.clone(), untagged.clone()],
            vec![untagged.clone(), tagged.clone()],
        ] {
            let partition = classify(&images, &["c0", "c1"]);
            assert!(partition.is_saved(&tagged.id));
            assert!(partition.is_saved(&untagged.id));
            assert!(!partition.has_deletions());
        }
    }

    #[test]
    fn test_single_representative_across_different_commits() {
        // Both images match a live commit, but only one representative slot
        // exists for the whole scan: the older build is retired even though
        // its commit is still live.
        let now = Utc::now();
        let images = vec![
            private("latest", now, &["c1"]),
            private("older", now - Duration::hours(1), &["c0"]),
        ];

        let partition = classify(&images, &["c0", "c1"]);

        assert!(partition.is_saved(&ImageId::new("latest")));
        assert!(partition.is_scheduled_for_deletion(&ImageId::new("older")));
    }

    #[test]
    fn test_commit_representative_survives_newer_untagged_build() {
        let now = Utc::now();
        let images = vec![
            private("release", now - Duration::hours(5), &["c0"]),
            private("nightly", now, &["nightly"]),
            private("stale", now - Duration::hours(8), &[]),
        ];

        let partition = classify(&images, &["c0"]);

        assert!(partition.is_saved(&ImageId::new("release")));
        assert!(partition.is_saved(&ImageId::new("nightly")));
        assert!(partition.is_scheduled_for_deletion(&ImageId::new("stale")));
    }

    #[test]
    fn test_displaced_latest_is_deleted_once_representative_moves_on() {
        let now = Utc::now();
        // "a" holds both slots, loses the latest slot to "b" (kept as the
        // representative), then loses the representative slot to "c".
        let images = vec![
            private("a", now - Duration::hours(3), &["c1"]),
            private("b", now - Duration::hours(1), &["feature"]),
            private("c", now - Duration::hours(2), &["c0"]),
        ];

        let partition = classify(&images, &["c0", "c1"]);

        assert_eq!(
            partition.saved_ids(),
            vec![ImageId::new("b"), ImageId::new("c")]
        );
        assert_eq!(partition.deletion_ids(), vec![ImageId::new("a")]);
    }

    #[test]
    fn test_equal_rank_ties_are_all_kept_until_superseded() {
        let now = Utc::now();
        let images = vec![
            private("a", now, &["c1"]),
            private("b", now, &["c1"]),
            private("c", now, &["c0"]),
        ];

        let partition = classify(&images, &["c0", "c1"]);

        assert_eq!(partition.saved_ids(), vec![ImageId::new("c")]);
        assert_eq!(
            partition.deletion_ids(),
            vec![ImageId::new("a"), ImageId::new("b")]
        );
    }

    #[test]
    fn test_latest_ties_are_all_retired_by_newer_image() {
        let now = Utc::now();
        let images = vec![
            private("a", now - Duration::hours(1), &[]),
            private("b", now - Duration::hours(1), &[]),
            private("c", now, &[]),
        ];

        let partition = classify(&images, &[]);

        assert_eq!(partition.saved_ids(), vec![ImageId::new("c")]);
        assert_eq!(
            partition.deletion_ids(),
            vec![ImageId::new("a"), ImageId::new("b")]
        );
    }

    #[test]
    fn test_decisive_tag_is_most_recent_match() {
        let now = Utc::now();
        let images = vec![
            private("a", now, &["c1"]),
            private("b", now, &["c2", "c0"]),
        ];

        let partition = classify(&images, &["c0", "c1", "c2"]);

        assert!(partition.is_saved(&ImageId::new("b")));
        assert!(partition.is_scheduled_for_deletion(&ImageId::new("a")));
    }

    #[test]
    fn test_catalog_order_decides_fate_of_representative_peers() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);
        let forward = vec![
            private("i0", earlier, &["c0"]),
            private("i1", earlier, &["c0"]),
            private("i2", now, &[]),
        ];
        let reversed: Vec<Image> = forward.iter().rev().cloned().collect();

        let partition = classify(&forward, &["c0"]);
        assert_eq!(
            partition.saved_ids(),
            vec![ImageId::new("i0"), ImageId::new("i2")]
        );
        assert_eq!(partition.deletion_ids(), vec![ImageId::new("i1")]);

        let partition = classify(&reversed, &["c0"]);
        assert_eq!(
            partition.saved_ids(),
            vec![ImageId::new("i0"), ImageId::new("i1"), ImageId::new("i2")]
        );
        assert!(partition.deletion_ids().is_empty());

        let index = CommitRecencyIndex::new(["c0"]);
        let sorted = RetentionClassifier::new().with_scan_order(ScanOrder::CreatedAt);
        assert_eq!(sorted.classify(&forward, &index), sorted.classify(&reversed, &index));
    }

    #[test]
    fn test_scan_order_parse() {
        assert_eq!("catalog".parse::<ScanOrder>().ok(), Some(ScanOrder::Catalog));
        assert_eq!(
            "created-at".parse::<ScanOrder>().ok(),
            Some(ScanOrder::CreatedAt)
        );
        assert!("random".parse::<ScanOrder>().is_err());
        assert_eq!(ScanOrder::CreatedAt.to_string(), "created-at");
    }

    #[test]
    fn test_created_at_scan_order_matches_catalog_order_on_examples() {
        let commits = commit_list();
        let same_time = Utc::now();
        let images = vec![
            private("z", same_time, &[commits[1]]),
            private("y", same_time, &[commits[0]]),
            private("x", same_time - Duration::hours(3), &[commits[0]]),
        ];
        let index = CommitRecencyIndex::new(commits.iter().copied());

        let catalog = RetentionClassifier::new().classify(&images, &index);
        let sorted = RetentionClassifier::new()
            .with_scan_order(ScanOrder::CreatedAt)
            .classify(&images, &index);

        assert_eq!(catalog, sorted);
        assert_eq!(catalog.saved_ids(), vec![ImageId::new("y")]);
    }
}
