//! GitHub HTTP client with rate limiting.
//!
//! Wraps the read-only parts of the GitHub REST API v3 that the mirror
//! needs: repository metadata, paginated issue listings and single issues.
//! Includes a token-bucket rate limiter to stay within the hourly request
//! budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult, EntityKind};
use crate::domain::models::{GitHubConfig, IssueListQuery, IssuePage, RemoteIssue, RemoteRepository};
use crate::domain::ports::IssueSource;

const USER_AGENT: &str = "issue-mirror";

/// Token-bucket rate limiter.
///
/// Allows up to `capacity` requests per `window`. When the bucket is
/// exhausted, [`acquire`](RateLimiter::acquire) sleeps until the window
/// resets and a token becomes available.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    tokens: u32,
    window: Duration,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tokens: capacity,
            window,
            window_start: Instant::now(),
        }
    }

    /// Acquire a single token, sleeping until the window resets if none is left.
    pub async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.window_start = Instant::now();
        }

        if self.tokens > 0 {
            self.tokens -= 1;
        } else {
            let remaining = self.window.saturating_sub(elapsed);
            tracing::warn!(
                sleep_ms = remaining.as_millis() as u64,
                "GitHub rate limit reached, sleeping"
            );
            tokio::time::sleep(remaining).await;
            self.tokens = self.capacity - 1;
            self.window_start = Instant::now();
        }
    }
}

/// HTTP client for the GitHub REST API v3.
///
/// Transport failures map to [`DomainError::TransientIo`], a 404 to
/// [`DomainError::NotFound`] and every other non-success status to
/// [`DomainError::Remote`].
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    /// Requests are sent unauthenticated when unset.
    token: Option<String>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_rate_limit(base_url, token, 5_000, Duration::from_secs(3_600))
    }

    pub fn with_rate_limit(
        base_url: impl Into<String>,
        token: Option<String>,
        capacity: u32,
        window: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(capacity, window))),
        }
    }

    pub fn from_config(config: &GitHubConfig) -> Self {
        Self::with_rate_limit(
            &config.api_base_url,
            config.token.clone(),
            config.requests_per_hour,
            Duration::from_secs(3_600),
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Acquire a rate-limit token and build a request with the API headers.
    async fn rate_limited_request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.rate_limiter.lock().await.acquire().await;
        let request = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT);

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET `url` and decode the JSON body, returning the response headers too.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        entity: EntityKind,
        key: &str,
    ) -> DomainResult<(T, HeaderMap)> {
        let resp = self
            .rate_limited_request(reqwest::Method::GET, url)
            .await
            .send()
            .await
            .map_err(|e| DomainError::TransientIo {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DomainError::not_found(entity, key));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Remote {
                status: status.as_u16(),
                message: format!("GitHub {operation} failed: {body}"),
            });
        }

        let headers = resp.headers().clone();
        let body = resp.json::<T>().await.map_err(|e| {
            DomainError::SerializationError(format!("GitHub {operation} parse failed: {e}"))
        })?;
        Ok((body, headers))
    }
}

#[async_trait]
impl IssueSource for GitHubClient {
    async fn fetch_repository(&self, owner: &str, name: &str) -> DomainResult<RemoteRepository> {
        let url = format!("{}/repos/{owner}/{name}", self.base_url);
        let (repository, _) = self
            .get_json("fetch_repository", &url, EntityKind::Repository, &format!("{owner}/{name}"))
            .await?;
        Ok(repository)
    }

    async fn list_issues(&self, owner: &str, name: &str, query: &IssueListQuery) -> DomainResult<IssuePage> {
        let url = format!(
            "{}/repos/{owner}/{name}/issues?state={}&page={}&per_page={}",
            self.base_url,
            query.state.as_str(),
            query.page,
            query.per_page
        );
        let (issues, headers): (Vec<RemoteIssue>, _) = self
            .get_json("list_issues", &url, EntityKind::Repository, &format!("{owner}/{name}"))
            .await?;

        let next_page = headers
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_next_page);

        tracing::debug!(owner, name, page = query.page, count = issues.len(), ?next_page, "fetched issue page");
        Ok(IssuePage { issues, next_page })
    }

    async fn get_issue(&self, owner: &str, name: &str, number: i32) -> DomainResult<RemoteIssue> {
        let url = format!("{}/repos/{owner}/{name}/issues/{number}", self.base_url);
        let (issue, _) = self
            .get_json("get_issue", &url, EntityKind::Issue, &format!("{owner}/{name}#{number}"))
            .await?;
        Ok(issue)
    }
}

/// Extract the `page` parameter of the `rel="next"` target from a `Link` header.
pub fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }

        let url = Url::parse(target.strip_prefix('<')?.strip_suffix('>')?).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let rl = RateLimiter::new(5_000, Duration::from_secs(3_600));
        assert_eq!(rl.capacity, 5_000);
        assert_eq!(rl.tokens, 5_000);
    }

    #[tokio::test]
    async fn test_rate_limiter_acquire_decrements_tokens() {
        let mut rl = RateLimiter::new(5, Duration::from_secs(60));
        rl.acquire().await;
        assert_eq!(rl.tokens, 4);
        rl.acquire().await;
        assert_eq!(rl.tokens, 3);
    }

    #[test]
    fn test_rate_limiter_zero_capacity_is_clamped() {
        let rl = RateLimiter::new(0, Duration::from_secs(60));
        assert_eq!(rl.capacity, 1);
    }

    #[test]
    fn test_parse_next_page() {
        let link = r#"<https://api.github.com/repositories/1/issues?state=all&page=3&per_page=2>; rel="next", <https://api.github.com/repositories/1/issues?state=all&page=9&per_page=2>; rel="last""#;
        assert_eq!(parse_next_page(link), Some(3));
    }

    #[test]
    fn test_parse_next_page_without_next() {
        let link = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="first", <https://api.github.com/repositories/1/issues?page=8>; rel="prev""#;
        assert_eq!(parse_next_page(link), None);
        assert_eq!(parse_next_page(""), None);
    }

    #[test]
    fn test_empty_token_means_unauthenticated() {
        assert!(!GitHubClient::new("https://api.github.com", Some(String::new())).is_authenticated());
        assert!(GitHubClient::new("https://api.github.com", Some("ghp_test".to_string())).is_authenticated());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = GitHubClient::new("https://ghe.example.com/api/v3/", None);
        assert_eq!(client.base_url, "https://ghe.example.com/api/v3");
    }
}
