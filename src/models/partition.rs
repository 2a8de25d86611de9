//! Keep/delete partition produced by the retention classifier.

use super::{Image, ImageId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Final keep/delete partition of one image collection.
///
/// Both maps are keyed by id and ordered, so reports and deletion batches
/// are deterministic. The two maps never share an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPartition {
    /// Images that must be kept.
    pub saved: BTreeMap<ImageId, Image>,
    /// Images that are safe to delete.
    pub for_deletion: BTreeMap<ImageId, Image>,
}

impl RetentionPartition {
    /// Creates an empty partition.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            saved: BTreeMap::new(),
            for_deletion: BTreeMap::new(),
        }
    }

    /// Returns `true` if `id` is kept.
    #[must_use]
    pub fn is_saved(&self, id: &ImageId) -> bool {
        self.saved.contains_key(id)
    }

    /// Returns `true` if `id` is scheduled for deletion.
    #[must_use]
    pub fn is_scheduled_for_deletion(&self, id: &ImageId) -> bool {
        self.for_deletion.contains_key(id)
    }

    /// Ids scheduled for deletion, in ascending order.
    #[must_use]
    pub fn deletion_ids(&self) -> Vec<ImageId> {
        self.for_deletion.keys().cloned().collect()
    }

    /// Ids that are kept, in ascending order.
    #[must_use]
    pub fn saved_ids(&self) -> Vec<ImageId> {
        self.saved.keys().cloned().collect()
    }

    /// Total number of classified images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.len() + self.for_deletion.len()
    }

    /// Returns `true` if nothing was classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.for_deletion.is_empty()
    }

    /// Returns `true` if at least one image is scheduled for deletion.
    #[must_use]
    pub fn has_deletions(&self) -> bool {
        !self.for_deletion.is_empty()
    }

    /// Checks that the partition covers `images` exactly once per id.
    ///
    /// Every input id must sit in exactly one of the two maps, and neither
    /// map may hold an id that was not in the input.
    #[must_use]
    pub fn covers_exactly<'a, I>(&self, images: I) -> bool
    where
        I: IntoIterator<Item = &'a Image>,
    {
        let mut seen = 0usize;
        let mut unique = std::collections::BTreeSet::new();
        for image in images {
            if !unique.insert(&image.id) {
                continue;
            }
            seen += 1;
            if self.is_saved(&image.id) == self.is_scheduled_for_deletion(&image.id) {
                return false;
            }
        }
        seen == self.len()
    }
}
