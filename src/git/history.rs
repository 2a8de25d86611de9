//! Commit history of the repository that produced the images.

use super::CommitSource;
use crate::{Error, Result};
use git2::{Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Read-only view over a local git repository.
///
/// Holds only the path; the repository is discovered on every read, so a
/// history for a path outside any repository can be built and never used.
#[derive(Debug, Clone)]
pub struct GitHistory {
    path: PathBuf,
}

impl GitHistory {
    /// Creates a history rooted at `path` without touching the disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a history and checks that `path` is inside a repository.
    ///
    /// Walks up parent directories like `git` itself does.
    ///
    /// # Errors
    ///
    /// Returns an error if no repository contains `path`.
    pub fn discover(path: impl Into<PathBuf>) -> Result<Self> {
        let history = Self::new(path);
        history.repository()?;
        Ok(history)
    }

    /// Path the repository is discovered from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn repository(&self) -> Result<Repository> {
        Repository::discover(&self.path).map_err(|e| Error::OperationFailed {
            operation: "discover_repository".to_string(),
            cause: format!(
                "Failed to discover git repository at {}: {}",
                self.path.display(),
                e
            ),
        })
    }

    /// Returns up to `depth` commit ids reachable from HEAD, newest first.
    ///
    /// An unborn HEAD (no commits yet) yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision walk fails.
    #[instrument(name = "keeper.git.recent_commits", skip(self), fields(path = %self.path.display()))]
    pub fn recent_commits(&self, depth: usize) -> Result<Vec<String>> {
        if depth == 0 {
            return Ok(Vec::new());
        }
        let repo = self.repository()?;
        if head_is_unborn(&repo) {
            return Ok(Vec::new());
        }

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.push_head()?;

        let commits = revwalk
            .take(depth)
            .map(|oid| oid.map(|oid| oid.to_string()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(count = commits.len(), depth, "Read recent commits");
        Ok(commits)
    }

    /// Short name of the checked-out branch.
    ///
    /// Returns `None` when HEAD is detached or unborn.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD cannot be resolved for another reason.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let repo = self.repository()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(String::from))
    }

    /// Returns up to `depth` tag names in the repository's tag order.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be listed.
    pub fn recent_tags(&self, depth: usize) -> Result<Vec<String>> {
        let names = self.repository()?.tag_names(None)?;
        Ok(names.iter().flatten().take(depth).map(String::from).collect())
    }
}

fn head_is_unborn(repo: &Repository) -> bool {
    matches!(
        repo.head(),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch
    )
}

impl CommitSource for GitHistory {
    fn recent_commits(&self, depth: usize) -> Result<Vec<String>> {
        Self::recent_commits(self, depth)
    }
}
