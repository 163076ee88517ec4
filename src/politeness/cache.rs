//! In-process wrapper around a [`ParsedRobots`] with fetch-time bookkeeping.
//! The durable cache (robots body + expiry) lives in the KVC domain hash;
//! this is the deserialized, ready-to-query form of that record.

use super::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    pub fn from_fetched_at(content: ParsedRobots, fetched_at: DateTime<Utc>) -> Self {
        Self { content, fetched_at }
    }

    /// robots.txt is refetched after 24 hours.
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.content.crawl_delay(user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_not_stale() {
        let cache = CachedRobots::new(ParsedRobots::allow_all());
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_cache_is_stale_after_24h() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());
        cache.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cache.is_stale());
    }

    #[test]
    fn test_cache_not_stale_at_23h() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());
        cache.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_delegates_to_content() {
        let cache = CachedRobots::new(ParsedRobots::allow_all());
        assert!(cache.is_allowed("/any/path", "TestBot"));
        assert_eq!(cache.crawl_delay("TestBot"), None);
    }
}
