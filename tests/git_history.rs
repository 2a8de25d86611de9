//! Cleanup driven by a real git repository.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use git2::{Repository, Signature, Time};
use image_keeper::catalog::{ImageCatalog, InMemoryCatalog};
use image_keeper::git::GitHistory;
use image_keeper::models::{Image, ImageId};
use image_keeper::services::CleanupService;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a repository with `count` commits one minute apart and returns
/// their ids oldest first.
fn repo_with_commits(count: usize) -> (TempDir, Vec<String>) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let mut ids = Vec::new();
    for i in 0..count {
        let seconds = 1_700_000_000 + i64::try_from(i).unwrap() * 60;
        let sig = Signature::new("ci", "ci@example.com", &Time::new(seconds, 0)).unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, &format!("build {i}"), &tree, &parents)
            .unwrap();
        ids.push(oid.to_string());
    }
    (dir, ids)
}

#[test]
fn test_history_lists_newest_commits_first() {
    let (dir, ids) = repo_with_commits(4);

    let commits = GitHistory::discover(dir.path())
        .unwrap()
        .recent_commits(3)
        .unwrap();

    assert_eq!(commits, vec![ids[3].clone(), ids[2].clone(), ids[1].clone()]);
}

#[test]
fn test_cleanup_keeps_image_of_newest_scanned_commit() {
    let (dir, ids) = repo_with_commits(5);
    let now = Utc::now();
    let catalog = Arc::new(InMemoryCatalog::new([
        // Built from an old commit but more recently than anything else.
        Image::new("rebuild", now)
            .with_name("runner")
            .with_tags([ids[0].as_str(), "master"]),
        Image::new("head", now - Duration::hours(2))
            .with_name("runner")
            .with_tags([ids[4].as_str(), "master"]),
        Image::new("previous", now - Duration::hours(4))
            .with_name("runner")
            .with_tags([ids[3].as_str(), "master"]),
    ]));

    let outcome = CleanupService::new(
        Arc::clone(&catalog) as Arc<dyn ImageCatalog>,
        Box::new(GitHistory::new(dir.path())),
    )
    .with_scan_depth(2)
    .run("runner")
    .unwrap();

    assert_eq!(outcome.commits_scanned, 2);
    assert_eq!(
        outcome.partition.saved_ids(),
        vec![ImageId::new("head"), ImageId::new("rebuild")]
    );
    assert_eq!(outcome.deleted, vec![ImageId::new("previous")]);
    assert_eq!(catalog.len(), 2);
}

#[test]
fn test_cleanup_outside_repository_fails_only_when_images_exist() {
    let dir = TempDir::new().unwrap();
    let empty = Arc::new(InMemoryCatalog::new(Vec::new()));

    let outcome = CleanupService::new(
        Arc::clone(&empty) as Arc<dyn ImageCatalog>,
        Box::new(GitHistory::new(dir.path())),
    )
    .run("runner");
    assert!(outcome.unwrap().partition.is_empty());

    let populated = Arc::new(InMemoryCatalog::new([
        Image::new("a", Utc::now()).with_name("runner"),
    ]));
    let result = CleanupService::new(
        populated as Arc<dyn ImageCatalog>,
        Box::new(GitHistory::new(dir.path())),
    )
    .run("runner");
    assert!(result.is_err());
}
