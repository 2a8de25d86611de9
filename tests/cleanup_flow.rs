//! End-to-end cleanup and publication flows against the in-memory catalog.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use image_keeper::catalog::{ImageCatalog, InMemoryCatalog};
use image_keeper::models::{ImageFilter, ImageId};
use image_keeper::rendering::{ReportFormat, render_cleanup, render_publication_plan};
use image_keeper::services::{
    CancellationToken, CleanupService, DeletionExecutor, PublicationService,
};
use image_keeper::{Error, Image, StaticCommits, Visibility};
use std::sync::Arc;

const OWNER: &str = "project-a";

fn builds() -> Vec<Image> {
    let now = Utc::now();
    vec![
        Image::new("b9551daf", now)
            .with_name("runner")
            .with_owner(OWNER)
            .with_tags(["c0", "master"]),
        Image::new("a66e2ab7", now - Duration::hours(1))
            .with_name("runner")
            .with_owner(OWNER)
            .with_tags(["c1", "master"]),
        Image::new("04f24cb4", now - Duration::hours(3))
            .with_name("runner")
            .with_owner(OWNER)
            .with_tags(["c2", "master"]),
        Image::new("foreign", now - Duration::hours(5))
            .with_name("runner")
            .with_owner("project-b")
            .with_tags(["c2"]),
    ]
}

fn cleanup(catalog: &Arc<InMemoryCatalog>) -> CleanupService {
    CleanupService::new(
        Arc::clone(catalog) as Arc<dyn ImageCatalog>,
        Box::new(StaticCommits::new(["c0", "c1", "c2"])),
    )
    .with_owner(OWNER)
}

#[test]
fn test_dry_run_reports_without_deleting() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));

    let outcome = cleanup(&catalog).with_dry_run(true).run("runner").unwrap();

    assert_eq!(catalog.len(), 4);
    assert!(outcome.dry_run);
    assert!(outcome.deleted.is_empty());
    assert_eq!(
        render_cleanup(&outcome, ReportFormat::Text).unwrap(),
        "Saved images:\n  b9551daf\n\nImages for deletion:\n  04f24cb4\n  a66e2ab7\n"
    );
    assert!(outcome.summary().contains("would delete 2"));
}

#[test]
fn test_cleanup_deletes_only_own_superseded_images() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));

    let outcome = cleanup(&catalog).run("runner").unwrap();

    assert_eq!(outcome.deleted.len(), 2);
    let remaining: Vec<ImageId> = catalog.images().into_iter().map(|image| image.id).collect();
    assert_eq!(
        remaining,
        vec![ImageId::new("b9551daf"), ImageId::new("foreign")]
    );
}

#[test]
fn test_failed_deletion_aborts_remaining_batch() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()).with_delete_failure("04f24cb4"));

    let err = cleanup(&catalog).run("runner").unwrap_err();

    assert!(matches!(err, Error::Catalog { status: Some(409), .. }));
    // Deletion runs in id order, so the failing id is the first one and
    // nothing was deleted.
    assert_eq!(catalog.len(), 4);
}

#[test]
fn test_cancelled_token_stops_before_first_deletion() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = cleanup(&catalog)
        .with_cancellation(cancel)
        .run("runner")
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { completed: 0 }));
    assert_eq!(catalog.len(), 4);
}

#[test]
fn test_unknown_name_is_a_noop() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));

    let outcome = cleanup(&catalog).run("builder").unwrap();

    assert!(outcome.partition.is_empty());
    assert_eq!(outcome.commits_scanned, 0);
    assert_eq!(catalog.len(), 4);
}

#[test]
fn test_explicit_delete_stops_at_missing_image() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));
    let executor = DeletionExecutor::new(Arc::clone(&catalog) as Arc<dyn ImageCatalog>);

    let ids = [
        ImageId::new("a66e2ab7"),
        ImageId::new("missing"),
        ImageId::new("04f24cb4"),
    ];
    let err = executor.delete_by_ids(&ids).unwrap_err();

    assert!(matches!(err, Error::Catalog { status: Some(404), .. }));
    assert_eq!(catalog.len(), 3);
    assert!(
        catalog
            .get_image(&ImageId::new("04f24cb4"))
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_publish_promotes_target_and_demotes_siblings() {
    let now = Utc::now();
    let catalog = Arc::new(InMemoryCatalog::new([
        Image::new("current", now - Duration::days(7))
            .with_name("runner")
            .with_owner(OWNER)
            .with_visibility(Visibility::Public)
            .with_protected(true),
        Image::new("candidate", now)
            .with_name("runner")
            .with_owner(OWNER),
    ]));
    let service = PublicationService::new(Arc::clone(&catalog) as Arc<dyn ImageCatalog>)
        .with_owner(OWNER)
        .with_protected(true);

    let plan = service.plan(&ImageId::new("candidate")).unwrap();
    assert_eq!(
        render_publication_plan(&plan, ReportFormat::Text).unwrap(),
        "These images will be published:\n  candidate\n\nThese images will be private:\n  current\n"
    );

    service.apply(&plan).unwrap();

    let images = catalog
        .list_images(&ImageFilter::new().with_name("runner"))
        .unwrap();
    let current = images.iter().find(|image| image.id.as_str() == "current").unwrap();
    let candidate = images.iter().find(|image| image.id.as_str() == "candidate").unwrap();
    assert_eq!(current.visibility, Visibility::Private);
    assert!(!current.protected);
    assert!(!current.hidden);
    assert_eq!(candidate.visibility, Visibility::Public);
    assert!(candidate.protected);
    assert!(!candidate.hidden);
}

#[test]
fn test_publish_unknown_image_is_invalid_input() {
    let catalog = Arc::new(InMemoryCatalog::new(builds()));
    let service = PublicationService::new(Arc::clone(&catalog) as Arc<dyn ImageCatalog>)
        .with_owner(OWNER);

    let err = service.plan(&ImageId::new("nope")).unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
}
