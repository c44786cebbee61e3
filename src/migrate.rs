use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the repository table if absent. Safe to run against a populated
/// database.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS GithubProjectUnfiltered (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            GITHUB_ID INTEGER NOT NULL UNIQUE,
            GITHUB_URL TEXT NOT NULL UNIQUE,
            GITHUB_OWNER_NAME TEXT NOT NULL,
            GITHUB_PROJECT_NAME TEXT NOT NULL,
            GITHUB_DESCRIPTION TEXT,
            GITHUB_LICENSE TEXT,
            GITHUB_IS_FORK INTEGER,
            GITHUB_NR_STARGAZERS INTEGER,
            GITHUB_NR_WATCHERS INTEGER,
            GITHUB_NR_FORKS INTEGER,
            GITHUB_NR_OPEN_ISSUES INTEGER,
            GITHUB_REPO_CREATION_DATE TEXT,
            GITHUB_LANGUAGE TEXT,
            GIT_PULL_HASH TEXT,
            GIT_PULL_DATE TEXT,
            GIT_NR_COMMITS INTEGER,
            GIT_NR_COMMITTERS INTEGER,
            GIT_FIRST_COMMIT_DATE TEXT,
            GIT_LAST_COMMIT_DATE TEXT,
            PROCESSED INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
