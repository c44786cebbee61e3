//! Enrichment: refresh the git-derived columns of one stored record.
//!
//! Re-enters the pipeline at "inspect → store write" for a working copy
//! that was cloned earlier, without re-running discovery. The record is
//! addressed by the clone's `origin` remote URL.

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::git::WorkingCopy;
use crate::history;
use crate::store::{Store, UpdateOutcome};

pub async fn run_update(config: &Config, path: &Path) -> Result<()> {
    let copy = WorkingCopy::open(path)?;
    let url = copy.origin_url()?;
    let snapshot = history::inspect(&copy)?;

    let store = Store::open(config).await?;
    let outcome = store.update_history(&url, &snapshot).await?;
    store.close().await;

    match outcome {
        UpdateOutcome::Updated => {
            println!(
                "update \"{}\": {} commits, {} committers, {} to {}",
                url,
                snapshot.commit_count,
                snapshot.committer_count,
                snapshot.first_commit,
                snapshot.last_commit
            );
            Ok(())
        }
        UpdateOutcome::NoMatch => bail!("\"{}\" is not inside the database", url),
    }
}
