use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Total wall-clock budget for one fetch attempt, including redirects.
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(45);
/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for reading the response body once headers arrive.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum redirect hops before giving up.
pub const MAX_REDIRECTS: u32 = 5;

/// Builds the shared HTTP client used for both robots.txt and page
/// fetches.
///
/// TLS certificate verification is disabled unconditionally. This
/// mirrors the wide swath of misconfigured-certificate sites a
/// best-effort crawler still needs to reach; there's no per-host
/// override.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(TOTAL_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        // No idle keep-alive sockets per host: FD counts should reflect
        // in-flight requests, not a growing pool of parked connections.
        .pool_max_idle_per_host(0)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&test_config());
        assert!(client.is_ok());
    }
}
