//! Commit recency index.
//!
//! Answers "is this tag a live commit?" and "how recent is it?" for the
//! retention classifier. Rank 0 is the most recent commit.

use std::collections::HashMap;

/// Lookup over the ordered list of live commit identifiers.
///
/// Built once per run from a most-recent-first list and never mutated
/// afterwards. When an identifier appears more than once it keeps the rank of
/// its first (most recent) occurrence.
#[derive(Debug, Clone, Default)]
pub struct CommitRecencyIndex {
    ordered: Vec<String>,
    ranks: HashMap<String, usize>,
}

impl CommitRecencyIndex {
    /// Builds the index from a most-recent-first list of commit ids.
    #[must_use]
    pub fn new<I, S>(commits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered: Vec<String> = commits.into_iter().map(Into::into).collect();
        let mut ranks = HashMap::with_capacity(ordered.len());
        for (rank, commit) in ordered.iter().enumerate() {
            ranks.entry(commit.clone()).or_insert(rank);
        }
        Self { ordered, ranks }
    }

    /// Returns `true` if `tag` is one of the tracked commits.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.ranks.contains_key(tag)
    }

    /// Position of `tag` in the recency list, `None` if it is not tracked.
    #[must_use]
    pub fn rank_of(&self, tag: &str) -> Option<usize> {
        self.ranks.get(tag).copied()
    }

    /// Lowest rank among `tags`, together with the tag that holds it.
    ///
    /// Ties keep the first tag in iteration order.
    #[must_use]
    pub fn best_match<'a, I>(&self, tags: I) -> Option<(&'a str, usize)>
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter()
            .filter_map(|tag| self.rank_of(tag).map(|rank| (tag.as_str(), rank)))
            .fold(None, |best, (tag, rank)| match best {
                Some((_, best_rank)) if best_rank <= rank => best,
                _ => Some((tag, rank)),
            })
    }

    /// Number of tracked commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns `true` if no commits are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Tracked commits, most recent first.
    #[must_use]
    pub fn commits(&self) -> &[String] {
        &self.ordered
    }
}
