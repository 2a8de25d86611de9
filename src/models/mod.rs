//! Data models for image keeper.
//!
//! This module contains the records exchanged between the catalog, the
//! retention classifier, and the reporters.

mod filter;
mod image;
mod partition;

pub use filter::{ImageFilter, ImageUpdate};
pub use image::{Image, ImageId, Visibility};
pub use partition::RetentionPartition;
