//! Sequential image deletion.

use super::CancellationToken;
use crate::catalog::ImageCatalog;
use crate::models::ImageId;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Deletes images one at a time, stopping at the first failure.
///
/// There are no retries and no rollback: images deleted before a failure
/// stay deleted.
pub struct DeletionExecutor {
    catalog: Arc<dyn ImageCatalog>,
    cancel: CancellationToken,
}

impl DeletionExecutor {
    /// Creates an executor over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn ImageCatalog>) -> Self {
        Self {
            catalog,
            cancel: CancellationToken::new(),
        }
    }

    /// Observes `cancel` between deletions.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deletes `ids` in order.
    ///
    /// Returns the ids that were deleted, which is all of them on success.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error unchanged for the first failed deletion,
    /// or [`Error::Cancelled`] if the token was cancelled before an id was
    /// reached.
    #[instrument(name = "keeper.deletion.delete_all", skip_all, fields(count = ids.len(), catalog = self.catalog.name()))]
    pub fn delete_all(&self, ids: &[ImageId]) -> Result<Vec<ImageId>> {
        let mut deleted = Vec::with_capacity(ids.len());

        for id in ids {
            if self.cancel.is_cancelled() {
                warn!(completed = deleted.len(), remaining = ids.len() - deleted.len(), "Deletion cancelled");
                return Err(Error::Cancelled {
                    completed: deleted.len(),
                });
            }

            if let Err(e) = self.catalog.delete_image(id) {
                warn!(image_id = %id, completed = deleted.len(), error = %e, "Deletion failed, aborting batch");
                metrics::counter!("keeper_image_deletions_failed_total").increment(1);
                return Err(e);
            }

            metrics::counter!("keeper_images_deleted_total").increment(1);
            info!(image_id = %id, "Deleted image");
            deleted.push(id.clone());
        }

        Ok(deleted)
    }

    /// Deletes explicitly requested images.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when `ids` is empty, otherwise the
    /// same errors as [`delete_all`](Self::delete_all).
    pub fn delete_by_ids(&self, ids: &[ImageId]) -> Result<Vec<ImageId>> {
        if ids.is_empty() {
            return Err(Error::InvalidInput(
                "at least one image id is required".to_string(),
            ));
        }
        self.delete_all(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::Image;
    use chrono::Utc;

    fn catalog(ids: &[&str]) -> Arc<InMemoryCatalog> {
        let now = Utc::now();
        Arc::new(InMemoryCatalog::new(ids.iter().map(|id| Image::new(*id, now))))
    }

    fn ids(ids: &[&str]) -> Vec<ImageId> {
        ids.iter().map(|id| ImageId::new(*id)).collect()
    }

    #[test]
    fn test_delete_all() {
        let catalog = catalog(&["a", "b", "c"]);
        let executor = DeletionExecutor::new(catalog.clone());

        let deleted = executor.delete_all(&ids(&["a", "c"])).unwrap();

        assert_eq!(deleted, ids(&["a", "c"]));
        assert_eq!(catalog.images().len(), 1);
    }

    #[test]
    fn test_aborts_on_first_failure() {
        let catalog = Arc::new(
            InMemoryCatalog::new(["a", "b", "c"].map(|id| Image::new(id, Utc::now())))
                .with_delete_failure("b"),
        );
        let executor = DeletionExecutor::new(catalog.clone());

        let err = executor.delete_all(&ids(&["a", "b", "c"])).unwrap_err();

        assert!(matches!(err, Error::Catalog { status: Some(409), .. }));
        let remaining: Vec<_> = catalog.images().into_iter().map(|i| i.id).collect();
        assert_eq!(remaining, ids(&["b", "c"]));
    }

    #[test]
    fn test_cancelled_before_start() {
        let catalog = catalog(&["a", "b"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = DeletionExecutor::new(catalog.clone()).with_cancellation(cancel);

        let err = executor.delete_all(&ids(&["a", "b"])).unwrap_err();

        assert!(matches!(err, Error::Cancelled { completed: 0 }));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_delete_by_ids_requires_ids() {
        let executor = DeletionExecutor::new(catalog(&["a"]));
        assert!(matches!(
            executor.delete_by_ids(&[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let executor = DeletionExecutor::new(catalog(&["a"]));
        assert!(executor.delete_all(&[]).unwrap().is_empty());
    }
}
