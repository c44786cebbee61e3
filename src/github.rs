//! GitHub search API client.
//!
//! Speaks the REST search endpoint with an optional bearer token and
//! exposes results as a lazy, forward-only stream. Throttle responses
//! (403/429) surface as [`ApiError::RateLimited`] so the driver can apply
//! its wait-and-retry policy; everything else is an ordinary failure.

use std::collections::VecDeque;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::error::ApiError;
use crate::models::DiscoveredRepo;

/// A source of discovered repositories, one item at a time.
///
/// Implemented by the live paginated search and by test fakes, so the
/// driver can be exercised without a network.
#[async_trait]
pub trait RepoSource: Send {
    /// The next repository, `None` when the stream is exhausted.
    async fn next(&mut self) -> Result<Option<DiscoveredRepo>, ApiError>;
}

#[derive(Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    per_page: u32,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            per_page: config.per_page,
        })
    }

    /// Begin a repository search. Nothing is fetched until the first
    /// [`RepoSource::next`] call.
    pub fn search(&self, query: &str) -> RepoSearch<'_> {
        RepoSearch {
            client: self,
            query: query.to_string(),
            page: 1,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req.header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn fetch_search_page(
        &self,
        query: &str,
        page: u32,
    ) -> Result<Vec<DiscoveredRepo>, ApiError> {
        let url = format!("{}/search/repositories", self.api_base);
        let per_page = self.per_page.to_string();
        let page_number = page.to_string();
        let response = self
            .request(&url)
            .query(&[
                ("q", query),
                ("per_page", per_page.as_str()),
                ("page", page_number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            let reset = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ApiError::RateLimited { reset });
        }

        // Search results are capped at 1000; the API rejects pages past
        // the cap with 422.
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY && page > 1 {
            return Ok(Vec::new());
        }

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items.into_iter().map(DiscoveredRepo::from).collect())
    }
}

/// Read the access token for an authenticated run: the configured token
/// file's first line, else `GITHUB_TOKEN`. Minting credentials is out of
/// scope here.
pub fn resolve_token(config: &GithubConfig) -> Result<String> {
    if let Some(path) = &config.token_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let token = content.lines().next().unwrap_or("").trim().to_string();
        if token.is_empty() {
            anyhow::bail!("Token file is empty: {}", path.display());
        }
        return Ok(token);
    }

    match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => anyhow::bail!(
            "No GitHub token found. Set github.token_file in the config, \
             export GITHUB_TOKEN, or pass --no-login"
        ),
    }
}

/// Lazy paginated stream over `/search/repositories`.
pub struct RepoSearch<'a> {
    client: &'a GithubClient,
    query: String,
    page: u32,
    buffer: VecDeque<DiscoveredRepo>,
    exhausted: bool,
}

#[async_trait]
impl RepoSource for RepoSearch<'_> {
    async fn next(&mut self) -> Result<Option<DiscoveredRepo>, ApiError> {
        if self.buffer.is_empty() && !self.exhausted {
            let items = self
                .client
                .fetch_search_page(&self.query, self.page)
                .await?;
            if (items.len() as u32) < self.client.per_page {
                self.exhausted = true;
            }
            self.page += 1;
            self.buffer.extend(items);
        }

        Ok(self.buffer.pop_front())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: i64,
    html_url: String,
    clone_url: String,
    name: String,
    owner: SearchOwner,
    description: Option<String>,
    license: Option<SearchLicense>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    stargazers_count: i64,
    #[serde(default)]
    watchers_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    open_issues_count: i64,
    created_at: DateTime<Utc>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchLicense {
    key: Option<String>,
}

impl From<SearchItem> for DiscoveredRepo {
    fn from(item: SearchItem) -> Self {
        DiscoveredRepo {
            github_id: item.id,
            url: item.html_url,
            clone_url: item.clone_url,
            owner: item.owner.login,
            name: item.name,
            description: item.description,
            license: item.license.and_then(|l| l.key),
            fork: item.fork,
            stargazers: item.stargazers_count,
            watchers: item.watchers_count,
            forks: item.forks_count,
            open_issues: item.open_issues_count,
            created_at: item.created_at,
            language: item.language,
        }
    }
}
