//! Bounded-concurrency HTTP(S) fetcher.
//!
//! One [`Fetcher`] is shared across all workers. It enforces a global
//! concurrency cap and a per-host cap on top of it, classifies outcomes
//! into the 900/901/902 generic/connection/timeout scheme alongside real
//! HTTP status codes, and follows redirects manually so a loop or an
//! over-long chain can be detected and reported rather than silently
//! eaten by the HTTP client.

mod client;
mod outcome;
mod retry;

pub use client::{build_http_client, MAX_REDIRECTS};
pub use outcome::{FetchOutcome, FetchTiming, FetchType};
pub use retry::RetryPolicy;

use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::lookup_host;
use tokio::sync::{Mutex, Semaphore};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Per-host concurrency cap, scaled to the global worker pool so a
/// single slow domain can't starve the rest: `max(5, min(20, workers/50))`.
pub fn per_host_limit(max_workers: usize) -> usize {
    (max_workers / 50).clamp(5, 20)
}

/// Global concurrency cap: `min(1000, 2*workers)`.
pub fn global_limit(max_workers: usize) -> usize {
    (2 * max_workers).min(1000)
}

pub struct Fetcher {
    client: Client,
    global: Arc<Semaphore>,
    per_host_limit: usize,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    retry_policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, max_workers: usize) -> Self {
        Self {
            client,
            global: Arc::new(Semaphore::new(global_limit(max_workers))),
            per_host_limit: per_host_limit(max_workers),
            per_host: Mutex::new(HashMap::new()),
            retry_policy: RetryPolicy::default(),
        }
    }

    async fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut map = self.per_host.lock().await;
        map.entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }

    /// Fetches `url`, retrying transient failures (timeouts, connection
    /// errors) with exponential backoff per [`RetryPolicy`], while
    /// holding the global and per-host permits for the whole attempt
    /// including backoff sleeps, so a struggling host doesn't get more
    /// concurrent load thrown at it while it's being retried. HTTP
    /// error statuses (4xx/5xx) are returned immediately on the first
    /// attempt and recorded as the visit outcome, not retried here.
    pub async fn fetch(&self, url: &str, host: &str, fetch_type: FetchType) -> FetchOutcome {
        let _global_permit = self.global.acquire().await;
        let host_sem = self.host_semaphore(host).await;
        let _host_permit = host_sem.acquire().await;

        let mut attempt = 0;
        loop {
            let outcome = self.fetch_once(url, fetch_type).await;

            if attempt >= self.retry_policy.max_retries || !RetryPolicy::is_retryable(&outcome) {
                return outcome;
            }

            let delay = self.retry_policy.delay_for_attempt(attempt);
            tracing::debug!(url, attempt, ?delay, "retrying fetch");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Performs a single fetch attempt (following redirects) without
    /// retry logic.
    async fn fetch_once(&self, url: &str, fetch_type: FetchType) -> FetchOutcome {
        let start = Instant::now();
        let dns = resolve_timing(url).await;

        let mut current_url = url.to_string();
        let mut visited = HashSet::new();
        let mut redirect_count = 0u32;

        loop {
            if !visited.insert(current_url.clone()) {
                return FetchOutcome::RedirectError {
                    message: format!("redirect loop detected at {}", current_url),
                    timing: FetchTiming { dns, total: start.elapsed() },
                };
            }
            if redirect_count > MAX_REDIRECTS {
                return FetchOutcome::RedirectError {
                    message: format!("too many redirects (max {})", MAX_REDIRECTS),
                    timing: FetchTiming { dns, total: start.elapsed() },
                };
            }

            match self.client.get(&current_url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_redirection() {
                        let location = response
                            .headers()
                            .get("location")
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());

                        let Some(location) = location else {
                            return FetchOutcome::RedirectError {
                                message: "redirect response without Location header".to_string(),
                                timing: FetchTiming { dns, total: start.elapsed() },
                            };
                        };

                        let resolved = resolve_redirect(&current_url, &location);
                        match resolved {
                            Some(next) => {
                                current_url = next;
                                redirect_count += 1;
                                continue;
                            }
                            None => {
                                return FetchOutcome::RedirectError {
                                    message: format!("invalid redirect target: {}", location),
                                    timing: FetchTiming { dns, total: start.elapsed() },
                                };
                            }
                        }
                    }

                    let final_url = response.url().to_string();
                    let content_type = response
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();

                    if !status.is_success() {
                        return FetchOutcome::HttpError {
                            status_code: status.as_u16(),
                            timing: FetchTiming { dns, total: start.elapsed() },
                        };
                    }

                    let _ = fetch_type;
                    return match response.bytes().await {
                        Ok(body) => FetchOutcome::Success {
                            final_url,
                            status_code: status.as_u16(),
                            content_type,
                            body: body.to_vec(),
                            redirect_count,
                            timing: FetchTiming { dns, total: start.elapsed() },
                        },
                        Err(e) => FetchOutcome::GenericError {
                            message: format!("failed to read body: {}", e),
                            timing: FetchTiming { dns, total: start.elapsed() },
                        },
                    };
                }
                Err(e) => {
                    let timing = FetchTiming { dns, total: start.elapsed() };
                    return if e.is_timeout() {
                        FetchOutcome::Timeout { timing }
                    } else if e.is_connect() {
                        FetchOutcome::ConnectionError { message: e.to_string(), timing }
                    } else {
                        FetchOutcome::GenericError { message: e.to_string(), timing }
                    };
                }
            }
        }
    }
}

async fn resolve_timing(url: &str) -> Option<std::time::Duration> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let port = parsed.port_or_known_default().unwrap_or(80);
    let start = Instant::now();
    lookup_host((host, port)).await.ok()?;
    Some(start.elapsed())
}

fn resolve_redirect(base: &str, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    let base_url = url::Url::parse(base).ok()?;
    base_url.join(location).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        let config = crate::config::UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        };
        Fetcher::new(build_http_client(&config).unwrap(), 100)
    }

    #[test]
    fn test_global_limit_capped() {
        assert_eq!(global_limit(10_000), 1000);
        assert_eq!(global_limit(100), 200);
    }

    #[test]
    fn test_per_host_limit_bounds() {
        assert_eq!(per_host_limit(10), 5);
        assert_eq!(per_host_limit(100_000), 20);
        assert_eq!(per_host_limit(500), 10);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/page", server.uri());
        let outcome = fetcher.fetch(&url, "127.0.0.1", FetchType::Page).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.status_code(), 200);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/missing", server.uri());
        let outcome = fetcher.fetch(&url, "127.0.0.1", FetchType::Page).await;
        assert_eq!(outcome.status_code(), 404);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_fetch_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/loop"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/loop", server.uri());
        let outcome = fetcher.fetch(&url, "127.0.0.1", FetchType::Page).await;
        assert!(matches!(outcome, FetchOutcome::RedirectError { .. }));
        assert_eq!(outcome.status_code(), 900);
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect_to_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/end"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/end"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/start", server.uri());
        let outcome = fetcher.fetch(&url, "127.0.0.1", FetchType::Page).await;
        match outcome {
            FetchOutcome::Success { redirect_count, final_url, .. } => {
                assert_eq!(redirect_count, 1);
                assert!(final_url.ends_with("/end"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_error_classified_901() {
        let fetcher = test_fetcher();
        let outcome = fetcher
            .fetch("http://127.0.0.1:1", "127.0.0.1", FetchType::Page)
            .await;
        assert_eq!(outcome.status_code(), 901);
    }
}
