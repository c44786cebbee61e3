//! Failure classification for the ingestion pipeline.
//!
//! The driver's retry policy needs to tell a provider throttle apart from
//! everything else, so the API client surfaces a typed error instead of a
//! bare `anyhow::Error`.

use thiserror::Error;

/// Failures raised by the GitHub API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller's request budget is exhausted. Carries the
    /// `x-ratelimit-reset` epoch timestamp when the server sent one.
    #[error("rate limited by the GitHub API")]
    RateLimited { reset: Option<u64> },

    /// Any non-success status that is not a throttle.
    #[error("GitHub API returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Connection, TLS, or body-decoding failure.
    #[error("GitHub request failed")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// True when `err` or anything in its chain is a rate-limit rejection.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_rate_limited)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detected_through_context_chain() {
        let err = anyhow::Error::from(ApiError::RateLimited { reset: Some(1) })
            .context("fetching page 3");
        assert!(is_rate_limited(&err));
    }

    #[test]
    fn other_errors_are_not_rate_limits() {
        let err = anyhow::Error::from(ApiError::Status {
            status: 502,
            url: "https://api.github.com/search/repositories".into(),
        });
        assert!(!is_rate_limited(&err));
        assert!(!is_rate_limited(&anyhow::anyhow!("clone failed")));
    }
}
