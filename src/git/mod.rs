//! Git operations.
//!
//! Reads the recent commit history that decides which tagged images are
//! still relevant.

mod history;

pub use history::GitHistory;

use crate::Result;

/// Source of the most-recent-first commit list.
pub trait CommitSource {
    /// Returns up to `depth` commit ids, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn recent_commits(&self, depth: usize) -> Result<Vec<String>>;
}

/// Fixed commit list, for callers that already know the history.
#[derive(Debug, Clone, Default)]
pub struct StaticCommits {
    commits: Vec<String>,
}

impl StaticCommits {
    /// Creates a source from a most-recent-first list.
    #[must_use]
    pub fn new<I, S>(commits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commits: commits.into_iter().map(Into::into).collect(),
        }
    }
}

impl CommitSource for StaticCommits {
    fn recent_commits(&self, depth: usize) -> Result<Vec<String>> {
        Ok(self.commits.iter().take(depth).cloned().collect())
    }
}
