//! Ingestion driver orchestration.
//!
//! Walks the paginated search stream strictly in order, one request in
//! flight, and runs the acquisition step for each item under the retry
//! policy. A rate-limited failure gets one re-attempt after the fixed
//! wait; any other failure gets one immediate re-attempt; a failure of
//! the re-attempt costs that item, not the run.

use anyhow::{Context, Result};

use crate::acquire::{acquire_repo, AcquireOutcome, FetchOptions};
use crate::github::RepoSource;
use crate::models::DiscoveredRepo;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::retry::{run_with_retry, RetryPolicy, Sleeper};
use crate::store::Store;

/// Counters printed at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchSummary {
    pub fetched: u64,
    pub added: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub async fn run_fetch(
    store: &Store,
    source: &mut dyn RepoSource,
    query: &str,
    options: &FetchOptions,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    reporter: &dyn ProgressReporter,
) -> Result<FetchSummary> {
    let mut summary = FetchSummary::default();

    loop {
        if let Some(limit) = options.limit {
            if summary.fetched >= limit as u64 {
                break;
            }
        }

        let repo = match next_item(source, policy, sleeper, reporter).await? {
            Some(repo) => repo,
            None => break,
        };
        summary.fetched += 1;

        let full_name = repo.full_name();
        let attempt = run_with_retry(policy, sleeper, reporter, || {
            acquire_repo(store, options, &repo, reporter)
        })
        .await;

        match attempt {
            Ok(outcome) => {
                report_outcome(&full_name, outcome);
                match outcome {
                    AcquireOutcome::Added | AcquireOutcome::RegisteredExistingClone => {
                        summary.added += 1
                    }
                    AcquireOutcome::AlreadyDownloaded
                    | AcquireOutcome::AlreadyStored
                    | AcquireOutcome::Duplicate => summary.skipped += 1,
                }
            }
            Err(err) => {
                summary.failed += 1;
                println!("failed \"{}\": {:#}", full_name, err);
            }
        }
    }

    println!("fetch \"{}\"", query);
    println!("  fetched: {} repositories", summary.fetched);
    println!("  added: {}", summary.added);
    println!("  skipped: {}", summary.skipped);
    println!("  failed: {}", summary.failed);
    println!("ok");

    Ok(summary)
}

/// Pull the next item from the stream under the same retry policy as
/// acquisition. A second consecutive page failure ends the run.
async fn next_item(
    source: &mut dyn RepoSource,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    reporter: &dyn ProgressReporter,
) -> Result<Option<DiscoveredRepo>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match source.next().await {
            Ok(item) => return Ok(item),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(err).context("search stream failed after retry");
                }
                if err.is_rate_limited() {
                    reporter.report(ProgressEvent::RateLimitWait {
                        wait_secs: policy.rate_limit_wait.as_secs(),
                    });
                    sleeper.sleep(policy.rate_limit_wait).await;
                }
            }
        }
    }
}

fn report_outcome(full_name: &str, outcome: AcquireOutcome) {
    match outcome {
        AcquireOutcome::Added => println!("add \"{}\" into database", full_name),
        AcquireOutcome::AlreadyDownloaded => {
            println!("repository already downloaded: \"{}\"", full_name)
        }
        AcquireOutcome::RegisteredExistingClone => {
            println!("repository already downloaded: \"{}\"", full_name);
            println!("add \"{}\" into database", full_name);
        }
        AcquireOutcome::AlreadyStored => println!("\"{}\" already inside database", full_name),
        AcquireOutcome::Duplicate => println!("\"{}\" is a duplicate", full_name),
    }
}
