//! Politeness Enforcer: robots.txt fetch/parse/cache and crawl-delay
//! bookkeeping.
//!
//! robots.txt is fetched best-effort: connection failure, a non-2xx
//! response, or a NUL byte in the body all degrade to an allow-all
//! [`ParsedRobots`] rather than blocking the domain. This mirrors how a
//! polite crawler actually behaves in the wild — a broken robots.txt
//! endpoint shouldn't take a whole domain off the map.

mod cache;
mod enforcer;
mod parser;

pub use cache::CachedRobots;
pub use enforcer::PolitenessEnforcer;
pub use parser::ParsedRobots;

use crate::fetcher::{FetchOutcome, FetchType, Fetcher};
use crate::metrics;

/// Fetches and parses robots.txt for `host`, trying `http://` first and
/// falling back to `https://` if that attempt didn't succeed.
pub async fn fetch_robots(fetcher: &Fetcher, host: &str) -> CachedRobots {
    for scheme in ["http", "https"] {
        let url = format!("{}://{}/robots.txt", scheme, host);
        let outcome = fetcher.fetch(&url, host, FetchType::RobotsTxt).await;
        metrics::record_fetch(
            "robots_txt",
            outcome.error_type().as_deref(),
            outcome.timing().dns,
            outcome.timing().total,
        );
        if let FetchOutcome::Success { status_code, body, .. } = outcome {
            if (200..300).contains(&status_code) {
                if let Ok(text) = std::str::from_utf8(&body) {
                    if !text.contains('\0') {
                        return CachedRobots::new(ParsedRobots::from_content(text));
                    }
                }
                // NUL byte or non-UTF8 body: not a real robots.txt, allow all.
                return CachedRobots::new(ParsedRobots::allow_all());
            }
        }
    }
    CachedRobots::new(ParsedRobots::allow_all())
}

/// Effective politeness delay for the next fetch to this domain: the
/// larger of the configured floor and any `Crawl-delay` the site
/// requested.
pub fn effective_delay(robots: &CachedRobots, user_agent: &str, min_delay_seconds: f64) -> f64 {
    match robots.crawl_delay(user_agent) {
        Some(requested) => requested.max(min_delay_seconds),
        None => min_delay_seconds,
    }
}
