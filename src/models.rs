//! Core data models used throughout repo-harvest.
//!
//! These types represent the repositories that flow through the discovery
//! and acquisition pipeline, and the git statistics derived from local
//! working copies.

use chrono::{DateTime, NaiveDate, Utc};

/// One search result from the GitHub search API, before persistence.
#[derive(Debug, Clone)]
pub struct DiscoveredRepo {
    /// Stable numeric repository id assigned by GitHub.
    pub github_id: i64,
    /// Canonical browser URL (`html_url`). Unique per repository.
    pub url: String,
    /// URL used for `git clone` (`clone_url`).
    pub clone_url: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    /// License key as reported by the API (e.g. `mit`), if any.
    pub license: Option<String>,
    pub fork: bool,
    pub stargazers: i64,
    pub watchers: i64,
    pub forks: i64,
    pub open_issues: i64,
    pub created_at: DateTime<Utc>,
    pub language: Option<String>,
}

impl DiscoveredRepo {
    /// `owner/name`, as GitHub renders it.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Statistics derived from a local working copy's commit history.
///
/// Constructed all-or-nothing by [`crate::history::inspect`]: a snapshot
/// never carries partially populated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    /// Full hash the working copy's HEAD resolves to.
    pub head_commit: String,
    /// Wall-clock date the snapshot was computed, not a repository time.
    pub taken_at: NaiveDate,
    /// Commits reachable from HEAD, merges excluded.
    pub commit_count: i64,
    /// Distinct author identities (`name <email>`) in the log.
    pub committer_count: i64,
    pub first_commit: NaiveDate,
    pub last_commit: NaiveDate,
}

/// A persisted row read back from the store.
#[derive(Debug, Clone)]
pub struct RepoRecord {
    pub id: i64,
    pub github_id: i64,
    pub url: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub license: Option<String>,
    pub fork: bool,
    pub stargazers: i64,
    pub watchers: i64,
    pub forks: i64,
    pub open_issues: i64,
    /// `YYYY-MM-DD`.
    pub created_at: String,
    pub language: Option<String>,
    pub head_commit: Option<String>,
    pub pulled_at: Option<String>,
    pub commit_count: Option<i64>,
    pub committer_count: Option<i64>,
    pub first_commit: Option<String>,
    pub last_commit: Option<String>,
    pub processed: bool,
}

impl RepoRecord {
    /// True when the git-derived columns are populated.
    pub fn has_history(&self) -> bool {
        self.head_commit.is_some()
    }
}
