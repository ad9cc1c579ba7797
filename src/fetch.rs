//! Page fetching with exponential backoff retry logic.
//!
//! This module provides the HTTP side of the scraper behind a small trait so
//! the traversal code never talks to `reqwest` directly:
//! - [`FetchPage`]: core trait, "give me the HTML body at this URL"
//! - [`HttpFetcher`]: reqwest-backed implementation with browser-like headers
//! - [`RetryFetch`]: decorator that adds retry logic to any `FetchPage`
//!
//! # Retry Strategy
//!
//! - `max_retries` additional attempts after the first (default 3)
//! - Delay doubles after every failure (multiplier 2.0, no jitter, no cap)
//! - Every error is retried identically; the last error is propagated

use crate::error::{Result, ScrapeError};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};
use url::Url;

/// Browser-like identification to avoid trivial blocking.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-request timeout applied to every fetch.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching one page of HTML.
///
/// Implementors resolve a URL to its response body. This abstraction lets the
/// traverser run against an in-memory fetcher in tests and lets [`RetryFetch`]
/// wrap any implementation.
pub trait FetchPage {
    /// Fetch the document at `url` and return its body as text.
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// reqwest-backed [`FetchPage`] implementation.
///
/// The client carries a realistic User-Agent and Accept headers and honors a
/// 30 second per-request timeout. Non-2xx responses surface as
/// [`ScrapeError::Status`], distinct from transport errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

/// Build the shared client used by every fetch session.
pub fn build_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

impl HttpFetcher {
    /// Create a fetcher with its own connection pool.
    pub fn new() -> Result<Self> {
        Ok(Self { client: build_client()? })
    }

    /// Create a fetcher sharing an existing client's pool.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status { status, url: url.clone() });
        }
        Ok(response.text().await?)
    }
}

/// Wrapper that adds bounded retry with exponential backoff to any
/// [`FetchPage`] implementation.
///
/// The delay starts at `base_delay` and is multiplied by `multiplier` after
/// every failed attempt. There is no jitter and no distinction between
/// transient and permanent failures; every error is retried until
/// `max_retries` additional attempts are spent, then the last error is
/// returned.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    multiplier: f64,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    /// Wrap `inner` with the default 2.0 backoff multiplier.
    ///
    /// Total attempts = `max_retries` + 1.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self { inner, max_retries, base_delay, multiplier: 2.0 }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;
        let mut delay = self.base_delay;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                    delay = delay.mul_f64(self.multiplier);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyFetcher {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FetchPage for FlakyFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ScrapeError::Status {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    url: url.clone(),
                })
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    fn test_url() -> Url {
        Url::parse("https://civicatlas.in/").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_two_failures() {
        let flaky = FlakyFetcher { failures: 2, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(flaky, 3, Duration::from_secs(1));
        let body = fetcher.fetch(&test_url()).await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_propagates_last_error_when_exhausted() {
        let flaky = FlakyFetcher { failures: 10, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(flaky, 3, Duration::from_secs(1));
        let err = fetcher.fetch(&test_url()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Status { .. }));
        // total attempts = max_retries + 1
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_doubles() {
        let flaky = FlakyFetcher { failures: 3, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(flaky, 3, Duration::from_secs(1));
        let t0 = tokio::time::Instant::now();
        fetcher.fetch(&test_url()).await.unwrap();
        // 1s + 2s + 4s of backoff under the paused clock
        assert_eq!(t0.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_http_fetcher_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_http_fetcher_surfaces_non_2xx_as_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        match fetcher.fetch(&url).await.unwrap_err() {
            ScrapeError::Status { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_over_http_fail_twice_then_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher =
            RetryFetch::new(HttpFetcher::new().unwrap(), 3, Duration::from_millis(10));
        let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "recovered");
    }
}
