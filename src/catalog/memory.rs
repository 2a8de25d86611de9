//! In-memory image catalog.

use super::ImageCatalog;
use crate::models::{Image, ImageFilter, ImageId, ImageUpdate};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::RwLock;

/// Process-local catalog backed by a vector.
///
/// Listing preserves insertion order, like a remote catalog's native order.
/// Deletes can be made to fail for chosen ids.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    images: RwLock<Vec<Image>>,
    failing_deletes: RwLock<HashSet<ImageId>>,
}

impl InMemoryCatalog {
    /// Creates a catalog holding `images`.
    #[must_use]
    pub fn new(images: impl IntoIterator<Item = Image>) -> Self {
        Self {
            images: RwLock::new(images.into_iter().collect()),
            failing_deletes: RwLock::new(HashSet::new()),
        }
    }

    /// Makes every delete of `id` fail.
    #[must_use]
    pub fn with_delete_failure(self, id: impl Into<ImageId>) -> Self {
        if let Ok(mut failing) = self.failing_deletes.write() {
            failing.insert(id.into());
        }
        self
    }

    /// Adds an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, image: Image) -> Result<()> {
        self.images
            .write()
            .map_err(|_| lock_poisoned("insert_image"))?
            .push(image);
        Ok(())
    }

    /// Snapshot of the stored images.
    #[must_use]
    pub fn images(&self) -> Vec<Image> {
        self.images
            .read()
            .map(|images| images.clone())
            .unwrap_or_default()
    }

    /// Number of stored images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.read().map(|images| images.len()).unwrap_or(0)
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn not_found(operation: &str, id: &ImageId) -> Error {
        Error::Catalog {
            operation: operation.to_string(),
            status: Some(404),
            cause: format!("image {id} not found"),
        }
    }
}

fn lock_poisoned(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "in-memory catalog lock poisoned".to_string(),
    }
}

impl ImageCatalog for InMemoryCatalog {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>> {
        let images = self
            .images
            .read()
            .map_err(|_| lock_poisoned("list_images"))?;
        Ok(images
            .iter()
            .filter(|image| filter.matches(image))
            .cloned()
            .collect())
    }

    fn delete_image(&self, id: &ImageId) -> Result<()> {
        let failing = self
            .failing_deletes
            .read()
            .map_err(|_| lock_poisoned("delete_image"))?
            .contains(id);
        if failing {
            return Err(Error::Catalog {
                operation: "delete_image".to_string(),
                status: Some(409),
                cause: format!("image {id} is in use"),
            });
        }

        let mut images = self
            .images
            .write()
            .map_err(|_| lock_poisoned("delete_image"))?;
        let position = images
            .iter()
            .position(|image| &image.id == id)
            .ok_or_else(|| Self::not_found("delete_image", id))?;
        images.remove(position);
        Ok(())
    }

    fn update_image(&self, id: &ImageId, update: &ImageUpdate) -> Result<()> {
        let mut images = self
            .images
            .write()
            .map_err(|_| lock_poisoned("update_image"))?;
        let image = images
            .iter_mut()
            .find(|image| &image.id == id)
            .ok_or_else(|| Self::not_found("update_image", id))?;
        update.apply_to(image);
        Ok(())
    }
}
