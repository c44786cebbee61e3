//! Per-item acquisition: clone decision, deduplication, record write.
//!
//! Converges under re-runs: a directory left behind by an interrupted
//! crawl is adopted instead of re-cloned, and an already-registered id is
//! skipped without side effects.

use std::path::PathBuf;

use anyhow::Result;

use crate::git::WorkingCopy;
use crate::history;
use crate::models::DiscoveredRepo;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::{InsertOutcome, Store};

/// Options for one discovery run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Materialize a working copy for each discovered repository.
    pub clone: bool,
    /// Directory clones are placed under.
    pub clone_dir: PathBuf,
    /// Stop after this many discovered items.
    pub limit: Option<usize>,
}

/// What acquisition did for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Inserted a new record (with a fresh clone when cloning is on).
    Added,
    /// Local clone already present and already registered.
    AlreadyDownloaded,
    /// Local clone was present but unregistered; inspected and inserted.
    RegisteredExistingClone,
    /// Identifier already stored; nothing done.
    AlreadyStored,
    /// The uniqueness constraint rejected the insert.
    Duplicate,
}

/// Directory name for a clone of `owner/name`: path separators become `-`.
pub fn clone_dir_name(full_name: &str) -> String {
    full_name.replace('\\', "-").replace('/', "-")
}

/// Run the acquisition step for one discovered repository.
pub async fn acquire_repo(
    store: &Store,
    options: &FetchOptions,
    repo: &DiscoveredRepo,
    reporter: &dyn ProgressReporter,
) -> Result<AcquireOutcome> {
    let full_name = repo.full_name();

    if options.clone {
        let dest = options.clone_dir.join(clone_dir_name(&full_name));

        if dest.exists() {
            if store.exists(repo.github_id).await? {
                return Ok(AcquireOutcome::AlreadyDownloaded);
            }
            // Cloned by an earlier interrupted run but never registered.
            let copy = WorkingCopy::open(&dest)?;
            let snapshot = history::inspect(&copy)?;
            return Ok(match store.insert(repo, Some(&snapshot)).await? {
                InsertOutcome::Inserted => AcquireOutcome::RegisteredExistingClone,
                InsertOutcome::Duplicate => AcquireOutcome::Duplicate,
            });
        }

        reporter.report(ProgressEvent::CloneStarted {
            full_name: full_name.clone(),
            dest: dest.display().to_string(),
        });
        let copy = WorkingCopy::clone(&repo.clone_url, &dest, reporter)?;

        if store.exists(repo.github_id).await? {
            return Ok(AcquireOutcome::AlreadyStored);
        }
        let snapshot = history::inspect(&copy)?;
        return Ok(match store.insert(repo, Some(&snapshot)).await? {
            InsertOutcome::Inserted => AcquireOutcome::Added,
            InsertOutcome::Duplicate => AcquireOutcome::Duplicate,
        });
    }

    if store.exists(repo.github_id).await? {
        return Ok(AcquireOutcome::AlreadyStored);
    }
    Ok(match store.insert(repo, None).await? {
        InsertOutcome::Inserted => AcquireOutcome::Added,
        InsertOutcome::Duplicate => AcquireOutcome::Duplicate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_dir_name_replaces_separators() {
        assert_eq!(clone_dir_name("octocat/Hello-World"), "octocat-Hello-World");
        assert_eq!(clone_dir_name("a\\b/c"), "a-b-c");
        assert_eq!(clone_dir_name("plain"), "plain");
    }
}
