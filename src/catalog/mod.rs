//! Image catalogs.
//!
//! The catalog lists, deletes, and updates images. Two implementations are
//! provided:
//!
//! - [`OpenStackCatalog`]: the OpenStack Image service (Glance v2),
//!   authenticated through Keystone v3.
//! - [`InMemoryCatalog`]: a process-local catalog for tests and dry
//!   experiments.

mod memory;
mod openstack;

pub use memory::InMemoryCatalog;
pub use openstack::{OpenStackCatalog, OpenStackSettings};

use crate::Result;
use crate::models::{Image, ImageFilter, ImageId, ImageUpdate};
use std::time::Duration;

/// Image storage backend.
///
/// Implementations must be thread-safe.
pub trait ImageCatalog: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Lists images matching `filter`, in the catalog's native order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>>;

    /// Fetches one image, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn get_image(&self, id: &ImageId) -> Result<Option<Image>> {
        let images = self.list_images(&ImageFilter::new().with_id(id.clone()))?;
        Ok(images.into_iter().find(|image| &image.id == id))
    }

    /// Deletes one image.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog refuses or the request fails.
    fn delete_image(&self, id: &ImageId) -> Result<()>;

    /// Applies a partial attribute update to one image.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog refuses or the request fails.
    fn update_image(&self, id: &ImageId, update: &ImageUpdate) -> Result<()>;
}

/// HTTP client configuration for catalog requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl HttpSettings {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `HOUSEKEEPER_HTTP_TIMEOUT_MS` and
    /// `HOUSEKEEPER_HTTP_CONNECT_TIMEOUT_MS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_u64("HOUSEKEEPER_HTTP_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_u64("HOUSEKEEPER_HTTP_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builds a blocking HTTP client with configured timeouts.
#[must_use]
pub fn build_http_client(settings: HttpSettings) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(concat!("image-keeper/", env!("CARGO_PKG_VERSION")));
    if settings.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(settings.timeout_ms));
    }
    if settings.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(settings.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build catalog HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}
