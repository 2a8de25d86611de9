//! Integration tests for image-keeper.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use image_keeper::gc::{CommitRecencyIndex, RetentionClassifier, ScanOrder};
use image_keeper::models::{Image, ImageId, Visibility};
use image_keeper::{CleanupService, Error, InMemoryCatalog, StaticCommits};
use std::sync::Arc;

#[test]
fn test_error_types() {
    let err = Error::InvalidInput("test message".to_string());
    let display = format!("{err}");
    assert!(display.contains("invalid input"));
    assert!(display.contains("test message"));

    let err = Error::OperationFailed {
        operation: "read".to_string(),
        cause: "file not found".to_string(),
    };
    let display = format!("{err}");
    assert!(display.contains("read"));
    assert!(display.contains("file not found"));

    let err = Error::Catalog {
        operation: "delete_image".to_string(),
        status: Some(409),
        cause: "image is in use".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "catalog operation 'delete_image' failed (409): image is in use"
    );

    let err = Error::Catalog {
        operation: "authenticate".to_string(),
        status: None,
        cause: "connection refused".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "catalog operation 'authenticate' failed: connection refused"
    );

    let err = Error::Config("bad toml".to_string());
    assert!(err.to_string().contains("configuration error"));

    let err = Error::Cancelled { completed: 2 };
    assert_eq!(err.to_string(), "cancelled after 2 deletion(s)");
}

/// A week of nightly builds plus a couple of merge builds.
fn nightly_history() -> (Vec<Image>, Vec<&'static str>) {
    let now = Utc::now();
    let commits = vec!["f00d", "beef", "cafe"];
    let mut images = Vec::new();
    for day in 1..=7 {
        images.push(
            Image::new(format!("nightly-{day}"), now - Duration::days(day))
                .with_name("ci-runner")
                .with_tags(["nightly", "master"]),
        );
    }
    images.push(
        Image::new("merge-beef", now - Duration::hours(30))
            .with_name("ci-runner")
            .with_tags(["beef", "master"]),
    );
    images.push(
        Image::new("merge-cafe", now - Duration::hours(50))
            .with_name("ci-runner")
            .with_tags(["cafe", "master"]),
    );
    images.push(
        Image::new("release-1.0", now - Duration::days(90))
            .with_name("ci-runner")
            .with_visibility(Visibility::Public),
    );
    (images, commits)
}

#[test]
fn test_nightly_history_keeps_latest_representative_and_public() {
    let (images, commits) = nightly_history();

    let partition = RetentionClassifier::new().classify(&images, &CommitRecencyIndex::new(commits));

    assert_eq!(
        partition.saved_ids(),
        vec![
            ImageId::new("merge-beef"),
            ImageId::new("nightly-1"),
            ImageId::new("release-1.0"),
        ]
    );
    assert_eq!(partition.for_deletion.len(), images.len() - 3);
    assert!(partition.covers_exactly(&images));
}

#[test]
fn test_nightly_history_is_order_independent_when_sorted_by_creation() {
    let (images, commits) = nightly_history();
    let mut shuffled = images.clone();
    shuffled.rotate_left(4);
    let index = CommitRecencyIndex::new(commits);
    let classifier = RetentionClassifier::new().with_scan_order(ScanOrder::CreatedAt);

    assert_eq!(
        classifier.classify(&images, &index),
        classifier.classify(&shuffled, &index)
    );
}

#[test]
fn test_cleanup_service_over_in_memory_catalog() {
    let (images, commits) = nightly_history();
    let catalog = Arc::new(InMemoryCatalog::new(images));

    let outcome = CleanupService::new(catalog.clone(), Box::new(StaticCommits::new(commits)))
        .run("ci-runner")
        .unwrap();

    assert_eq!(outcome.deleted.len(), 7);
    let remaining: Vec<ImageId> = catalog.images().into_iter().map(|image| image.id).collect();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.contains(&ImageId::new("release-1.0")));
    assert!(outcome.summary().contains("ci-runner"));
}
