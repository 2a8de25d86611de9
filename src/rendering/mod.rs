//! Report rendering.
//!
//! Formats classification results, image listings, and publication plans as
//! text, JSON, or YAML.

mod report;

pub use report::{
    ReportFormat, render_cleanup, render_image_list, render_partition, render_publication_plan,
};
