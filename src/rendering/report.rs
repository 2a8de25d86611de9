//! Command output formatting.
//!
//! Pure functions over results; nothing here touches the catalog.

use crate::models::{Image, RetentionPartition};
use crate::services::{CleanupOutcome, PublicationPlan};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Plain text, one id per line.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

impl ReportFormat {
    /// Returns the format as a config string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::InvalidInput(format!(
                "unknown report format '{other}' (expected text, json, or yaml)"
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn serialize<T: Serialize>(value: &T, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(value)
            .map(|mut out| {
                out.push('\n');
                out
            })
            .map_err(|e| Error::OperationFailed {
                operation: "render_json".to_string(),
                cause: e.to_string(),
            }),
        ReportFormat::Yaml => serde_yaml_ng::to_string(value).map_err(|e| Error::OperationFailed {
            operation: "render_yaml".to_string(),
            cause: e.to_string(),
        }),
        ReportFormat::Text => Err(Error::InvalidInput(
            "text output has no serialized form".to_string(),
        )),
    }
}

fn id_section<'a>(out: &mut String, title: &str, images: impl Iterator<Item = &'a Image>) {
    let _ = writeln!(out, "{title}:");
    for image in images {
        let _ = writeln!(out, "  {}", image.id);
    }
}

/// Renders the keep/delete partition.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_partition(partition: &RetentionPartition, format: ReportFormat) -> Result<String> {
    if format != ReportFormat::Text {
        return serialize(partition, format);
    }

    let mut out = String::new();
    id_section(&mut out, "Saved images", partition.saved.values());
    out.push('\n');
    id_section(&mut out, "Images for deletion", partition.for_deletion.values());
    Ok(out)
}

/// Renders a cleanup outcome. Text output is the partition only.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_cleanup(outcome: &CleanupOutcome, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => render_partition(&outcome.partition, format),
        _ => serialize(outcome, format),
    }
}

/// Renders an image listing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_image_list(images: &[Image], format: ReportFormat) -> Result<String> {
    if format != ReportFormat::Text {
        return serialize(&images, format);
    }

    let mut out = String::new();
    for (i, image) in images.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Name: {}", image.name);
        let _ = writeln!(out, "ID: {}", image.id);
        let _ = writeln!(out, "CreatedAt: {}", image.created_at.to_rfc3339());
        let _ = writeln!(out, "Visibility: {}", image.visibility);
        let _ = writeln!(out, "Protected: {}", image.protected);
        let _ = writeln!(out, "Hidden: {}", image.hidden);
        if !image.tags.is_empty() {
            out.push_str("Tags:\n");
            for tag in &image.tags {
                let _ = writeln!(out, "  {tag}");
            }
        }
        if !image.properties.is_empty() {
            out.push_str("Properties:\n");
            for (key, value) in &image.properties {
                let _ = writeln!(out, "  {key}: {value}");
            }
        }
    }
    Ok(out)
}

#[derive(Serialize)]
struct PublicationReport<'a> {
    publish: &'a Image,
    protected: bool,
    hidden: bool,
    demote: Vec<&'a Image>,
}

/// Renders what a publication would change.
///
/// Only siblings that currently stand out (protected, visible, or public)
/// are listed as demotions.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_publication_plan(plan: &PublicationPlan, format: ReportFormat) -> Result<String> {
    let demote = plan.notable_demotions();
    if format != ReportFormat::Text {
        let report = PublicationReport {
            publish: &plan.target,
            protected: plan.protected,
            hidden: plan.hidden,
            demote,
        };
        return serialize(&report, format);
    }

    let mut out = String::new();
    id_section(&mut out, "These images will be published", std::iter::once(&plan.target));
    out.push('\n');
    id_section(&mut out, "These images will be private", demote.into_iter());
    Ok(out)
}
