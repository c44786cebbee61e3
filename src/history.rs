//! History Inspector: derive commit statistics from a local working copy.
//!
//! Every query is a read-only `git` invocation against a full-history
//! clone. A snapshot is built all-or-nothing: if any query fails (invalid
//! path, empty repository), the whole inspection fails and no partial
//! snapshot exists.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::git::{git_stdout, WorkingCopy};
use crate::models::HistorySnapshot;

/// Compute a [`HistorySnapshot`] for `copy`.
pub fn inspect(copy: &WorkingCopy) -> Result<HistorySnapshot> {
    let head_commit = copy.head_commit()?;
    let commit_count = commit_count(copy.root())?;
    let committer_count = committer_count(copy.root())?;
    let (first_ts, last_ts) = commit_time_range(copy.root())?;

    Ok(HistorySnapshot {
        head_commit,
        taken_at: Utc::now().date_naive(),
        commit_count,
        committer_count,
        first_commit: date_from_epoch(first_ts)?,
        last_commit: date_from_epoch(last_ts)?,
    })
}

/// Commits reachable from HEAD, merges excluded.
fn commit_count(root: &Path) -> Result<i64> {
    let out = git_stdout(root, &["rev-list", "HEAD", "--count", "--no-merges"])?;
    out.parse()
        .with_context(|| format!("Unexpected rev-list output: {:?}", out))
}

/// Distinct author identities, counted as unique trimmed `name <email>`
/// lines. No case folding is applied.
fn committer_count(root: &Path) -> Result<i64> {
    let out = git_stdout(root, &["log", "--format=%aN <%aE>"])?;
    let identities: BTreeSet<&str> = out
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(identities.len() as i64)
}

/// Minimum and maximum author timestamps (Unix epoch seconds) reachable
/// from HEAD.
fn commit_time_range(root: &Path) -> Result<(i64, i64)> {
    let out = git_stdout(root, &["log", "--format=%at"])?;
    let mut first = i64::MAX;
    let mut last = i64::MIN;

    for line in out.lines() {
        let ts: i64 = line
            .trim()
            .parse()
            .with_context(|| format!("Unexpected timestamp in git log: {:?}", line))?;
        first = first.min(ts);
        last = last.max(ts);
    }

    if first == i64::MAX {
        bail!("Repository at {} has no commits", root.display());
    }

    Ok((first, last))
}

fn date_from_epoch(ts: i64) -> Result<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| anyhow::anyhow!("Commit timestamp out of range: {}", ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_zero_is_1970() {
        assert_eq!(
            date_from_epoch(0).unwrap().format("%Y-%m-%d").to_string(),
            "1970-01-01"
        );
    }

    #[test]
    fn inspect_rejects_non_repository_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WorkingCopy::open(dir.path()).is_err());
    }
}
