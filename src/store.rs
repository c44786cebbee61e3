//! Record Store: the durable table of discovered repositories.
//!
//! One row per repository, keyed by GitHub id and by URL (both unique).
//! Every write is a single statement, so an interrupted crawl costs at
//! most the in-flight item. The schema is created on open, which is safe
//! against an already-populated database.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{DiscoveredRepo, HistorySnapshot, RepoRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The id or URL uniqueness constraint rejected the row. The existing
    /// record is untouched.
    Duplicate,
}

/// Result of a history update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No stored record matches the URL.
    NoMatch,
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the store, creating the database file and schema if absent.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// True iff a record with this GitHub id is present. The sole
    /// deduplication gate; callers check it immediately before inserting.
    pub async fn exists(&self, github_id: i64) -> Result<bool> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT ID FROM GithubProjectUnfiltered WHERE GITHUB_ID = ?")
                .bind(github_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.is_some())
    }

    /// Insert exactly one record. A uniqueness violation (id or URL
    /// already present) is reported as [`InsertOutcome::Duplicate`]
    /// rather than an error: resumed runs race harmlessly against the
    /// existence check.
    pub async fn insert(
        &self,
        repo: &DiscoveredRepo,
        history: Option<&HistorySnapshot>,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO GithubProjectUnfiltered (
                GITHUB_ID,
                GITHUB_URL,
                GITHUB_OWNER_NAME,
                GITHUB_PROJECT_NAME,
                GITHUB_DESCRIPTION,
                GITHUB_LICENSE,
                GITHUB_IS_FORK,
                GITHUB_NR_STARGAZERS,
                GITHUB_NR_WATCHERS,
                GITHUB_NR_FORKS,
                GITHUB_NR_OPEN_ISSUES,
                GITHUB_REPO_CREATION_DATE,
                GITHUB_LANGUAGE,
                GIT_PULL_HASH,
                GIT_PULL_DATE,
                GIT_NR_COMMITS,
                GIT_NR_COMMITTERS,
                GIT_FIRST_COMMIT_DATE,
                GIT_LAST_COMMIT_DATE,
                PROCESSED
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(repo.github_id)
        .bind(&repo.url)
        .bind(&repo.owner)
        .bind(&repo.name)
        .bind(&repo.description)
        .bind(&repo.license)
        .bind(repo.fork)
        .bind(repo.stargazers)
        .bind(repo.watchers)
        .bind(repo.forks)
        .bind(repo.open_issues)
        .bind(repo.created_at.format(DATE_FORMAT).to_string())
        .bind(&repo.language)
        .bind(history.map(|h| h.head_commit.clone()))
        .bind(history.map(|h| h.taken_at.format(DATE_FORMAT).to_string()))
        .bind(history.map(|h| h.commit_count))
        .bind(history.map(|h| h.committer_count))
        .bind(history.map(|h| h.first_commit.format(DATE_FORMAT).to_string()))
        .bind(history.map(|h| h.last_commit.format(DATE_FORMAT).to_string()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite only the history-derived columns of the record matching
    /// `url`.
    pub async fn update_history(
        &self,
        url: &str,
        history: &HistorySnapshot,
    ) -> Result<UpdateOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE GithubProjectUnfiltered
            SET GIT_PULL_HASH = ?,
                GIT_PULL_DATE = ?,
                GIT_NR_COMMITS = ?,
                GIT_NR_COMMITTERS = ?,
                GIT_FIRST_COMMIT_DATE = ?,
                GIT_LAST_COMMIT_DATE = ?
            WHERE GITHUB_URL = ?
            "#,
        )
        .bind(&history.head_commit)
        .bind(history.taken_at.format(DATE_FORMAT).to_string())
        .bind(history.commit_count)
        .bind(history.committer_count)
        .bind(history.first_commit.format(DATE_FORMAT).to_string())
        .bind(history.last_commit.format(DATE_FORMAT).to_string())
        .bind(url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(UpdateOutcome::NoMatch)
        } else {
            Ok(UpdateOutcome::Updated)
        }
    }

    pub async fn get_by_github_id(&self, github_id: i64) -> Result<Option<RepoRecord>> {
        let row = sqlx::query("SELECT * FROM GithubProjectUnfiltered WHERE GITHUB_ID = ?")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| RepoRecord {
            id: row.get("ID"),
            github_id: row.get("GITHUB_ID"),
            url: row.get("GITHUB_URL"),
            owner: row.get("GITHUB_OWNER_NAME"),
            name: row.get("GITHUB_PROJECT_NAME"),
            description: row.get("GITHUB_DESCRIPTION"),
            license: row.get("GITHUB_LICENSE"),
            fork: row.get("GITHUB_IS_FORK"),
            stargazers: row.get("GITHUB_NR_STARGAZERS"),
            watchers: row.get("GITHUB_NR_WATCHERS"),
            forks: row.get("GITHUB_NR_FORKS"),
            open_issues: row.get("GITHUB_NR_OPEN_ISSUES"),
            created_at: row.get("GITHUB_REPO_CREATION_DATE"),
            language: row.get("GITHUB_LANGUAGE"),
            head_commit: row.get("GIT_PULL_HASH"),
            pulled_at: row.get("GIT_PULL_DATE"),
            commit_count: row.get("GIT_NR_COMMITS"),
            committer_count: row.get("GIT_NR_COMMITTERS"),
            first_commit: row.get("GIT_FIRST_COMMIT_DATE"),
            last_commit: row.get("GIT_LAST_COMMIT_DATE"),
            processed: row.get("PROCESSED"),
        }))
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM GithubProjectUnfiltered")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.db.path = dir.path().join("harvest.sqlite");
        let store = Store::open(&config).await.unwrap();
        (dir, store)
    }

    fn sample_repo(github_id: i64) -> DiscoveredRepo {
        DiscoveredRepo {
            github_id,
            url: format!("https://github.com/octocat/repo-{}", github_id),
            clone_url: format!("https://github.com/octocat/repo-{}.git", github_id),
            owner: "octocat".into(),
            name: format!("repo-{}", github_id),
            description: Some("demo".into()),
            license: Some("mit".into()),
            fork: false,
            stargazers: 120,
            watchers: 120,
            forks: 4,
            open_issues: 2,
            created_at: Utc.with_ymd_and_hms(2019, 3, 14, 9, 0, 0).unwrap(),
            language: Some("Rust".into()),
        }
    }

    fn sample_history() -> HistorySnapshot {
        HistorySnapshot {
            head_commit: "0123456789abcdef0123456789abcdef01234567".into(),
            taken_at: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            commit_count: 42,
            committer_count: 5,
            first_commit: NaiveDate::from_ymd_opt(2019, 3, 15).unwrap(),
            last_commit: NaiveDate::from_ymd_opt(2024, 5, 30).unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_then_exists() {
        let (_dir, store) = temp_store().await;
        assert!(!store.exists(1).await.unwrap());

        let outcome = store.insert(&sample_repo(1), None).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(store.exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn insert_without_history_leaves_history_null() {
        let (_dir, store) = temp_store().await;
        store.insert(&sample_repo(2), None).await.unwrap();

        let record = store.get_by_github_id(2).await.unwrap().unwrap();
        assert!(!record.has_history());
        assert!(record.commit_count.is_none());
        assert!(record.first_commit.is_none());
        assert!(!record.processed);
        assert_eq!(record.created_at, "2019-03-14");
    }

    #[tokio::test]
    async fn insert_with_history_populates_all_columns() {
        let (_dir, store) = temp_store().await;
        store
            .insert(&sample_repo(3), Some(&sample_history()))
            .await
            .unwrap();

        let record = store.get_by_github_id(3).await.unwrap().unwrap();
        assert!(record.has_history());
        assert_eq!(record.commit_count, Some(42));
        assert_eq!(record.committer_count, Some(5));
        assert_eq!(record.first_commit.as_deref(), Some("2019-03-15"));
        assert_eq!(record.last_commit.as_deref(), Some("2024-05-30"));
    }

    #[tokio::test]
    async fn duplicate_github_id_is_rejected_without_altering_the_row() {
        let (_dir, store) = temp_store().await;
        store.insert(&sample_repo(4), None).await.unwrap();

        let mut clash = sample_repo(4);
        clash.url = "https://github.com/octocat/other".into();
        clash.stargazers = 9999;
        let outcome = store.insert(&clash, None).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);

        let record = store.get_by_github_id(4).await.unwrap().unwrap();
        assert_eq!(record.url, "https://github.com/octocat/repo-4");
        assert_eq!(record.stargazers, 120);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_url_is_rejected() {
        let (_dir, store) = temp_store().await;
        store.insert(&sample_repo(5), None).await.unwrap();

        let mut clash = sample_repo(6);
        clash.url = "https://github.com/octocat/repo-5".into();
        let outcome = store.insert(&clash, None).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_history_rewrites_only_history_columns() {
        let (_dir, store) = temp_store().await;
        let repo = sample_repo(7);
        store.insert(&repo, None).await.unwrap();

        let outcome = store
            .update_history(&repo.url, &sample_history())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);

        let record = store.get_by_github_id(7).await.unwrap().unwrap();
        assert_eq!(record.commit_count, Some(42));
        assert_eq!(record.committer_count, Some(5));
        // Discovery-derived columns stay as inserted.
        assert_eq!(record.stargazers, 120);
        assert_eq!(record.description.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn update_history_reports_missing_url() {
        let (_dir, store) = temp_store().await;
        let outcome = store
            .update_history("https://github.com/nobody/nothing", &sample_history())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NoMatch);
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.db.path = dir.path().join("harvest.sqlite");

        let store = Store::open(&config).await.unwrap();
        store.insert(&sample_repo(8), None).await.unwrap();
        store.close().await;

        // Reopen against the populated file.
        let store = Store::open(&config).await.unwrap();
        assert!(store.exists(8).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
