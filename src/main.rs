//! # repo-harvest CLI (`harvest`)
//!
//! The `harvest` binary discovers GitHub repositories matching a search
//! query, optionally clones them, and records platform metadata plus
//! locally computed git statistics in a SQLite database.
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite database and schema |
//! | `harvest fetch "<query>"` | Run a discovery crawl |
//! | `harvest update <path>` | Refresh git statistics for one stored record |
//!
//! ## Examples
//!
//! ```bash
//! # Metadata only, first 50 results
//! harvest fetch "topic:compilers stars:>100" --limit 50
//!
//! # Clone everything into ./repos while crawling
//! harvest fetch "language:rust stars:>500" --clone-repo --clone-repo-dir ./repos
//!
//! # Anonymous access (60 requests/hour budget)
//! harvest fetch "user:octocat" --no-login
//!
//! # Re-derive git statistics for an existing clone
//! harvest update ./repos/octocat-Hello-World
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_harvest::acquire::FetchOptions;
use repo_harvest::config;
use repo_harvest::fetch;
use repo_harvest::github::{self, GithubClient};
use repo_harvest::migrate;
use repo_harvest::progress::ProgressMode;
use repo_harvest::retry::{RetryPolicy, TokioSleeper};
use repo_harvest::store::Store;
use repo_harvest::update;

/// repo-harvest — discover GitHub repositories and record their git
/// history statistics.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; built-in defaults apply when the file does not exist.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Discover GitHub repositories by search query and record git history statistics in SQLite",
    version,
    long_about = "repo-harvest runs a paginated GitHub repository search, optionally clones each \
    result, derives commit statistics from the local history, and stores the merged record in a \
    SQLite database with strict deduplication, so interrupted crawls can simply be re-run."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/harvest.toml`. Database, GitHub API, and
    /// retry settings are read from this file.
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    /// Progress output on stderr: `auto`, `off`, `human`, or `json`.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the repository table. This
    /// command is idempotent — running it multiple times is safe, and
    /// `fetch` creates the schema on demand anyway.
    Init,

    /// Discover repositories matching a search query.
    ///
    /// Runs the paginated search, acquires each result in order, and
    /// inserts one record per previously unseen repository. Survives
    /// provider rate limits via a fixed wait-and-retry policy.
    Fetch {
        /// GitHub search query, e.g. `"topic:compilers stars:>100"`.
        query: String,

        /// Access the API anonymously (lower request budget, no token
        /// needed).
        #[arg(long)]
        no_login: bool,

        /// Clone each discovered repository to local disk.
        #[arg(long)]
        clone_repo: bool,

        /// Directory to place clones in. Must exist.
        #[arg(long, default_value = ".")]
        clone_repo_dir: PathBuf,

        /// Maximum number of results to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Refresh the git-derived columns of one stored record.
    ///
    /// Resolves the working copy's `origin` URL, recomputes commit
    /// statistics, and rewrites only the git columns of the matching row.
    Update {
        /// Path to a local git working copy.
        path: PathBuf,
    },
}

fn progress_mode(flag: &str) -> Result<ProgressMode> {
    match flag {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => anyhow::bail!(
            "Unknown progress mode: '{}'. Must be auto, off, human, or json.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let reporter = progress_mode(&cli.progress)?.reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Fetch {
            query,
            no_login,
            clone_repo,
            clone_repo_dir,
            limit,
        } => {
            if clone_repo && !clone_repo_dir.is_dir() {
                anyhow::bail!(
                    "\"{}\" is not an existing directory",
                    clone_repo_dir.display()
                );
            }

            let token = if no_login {
                None
            } else {
                Some(github::resolve_token(&cfg.github)?)
            };

            let client = GithubClient::new(&cfg.github, token)?;
            let mut source = client.search(&query);
            let store = Store::open(&cfg).await?;

            let options = FetchOptions {
                clone: clone_repo,
                clone_dir: clone_repo_dir,
                limit,
            };
            let policy = RetryPolicy::from_config(&cfg.retry);

            fetch::run_fetch(
                &store,
                &mut source,
                &query,
                &options,
                &policy,
                &TokioSleeper,
                reporter.as_ref(),
            )
            .await?;
            store.close().await;
        }
        Commands::Update { path } => {
            if !path.is_dir() {
                anyhow::bail!("The directory \"{}\" does not exist", path.display());
            }
            update::run_update(&cfg, &path).await?;
        }
    }

    Ok(())
}
