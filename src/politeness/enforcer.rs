//! [`PolitenessEnforcer`]: the stateful façade workers call into for
//! every URL and domain decision. Keeps an in-process cache of parsed
//! robots.txt bodies (one fetch per domain per TTL, not one fetch per
//! worker) backed by the durable `domain:<host>` hash in the KV
//! service, so a restart or a second worker don't refetch something
//! another worker already cached.

use super::{fetch_robots, CachedRobots, ParsedRobots};
use crate::fetcher::Fetcher;
use crate::kvc::{KvClient, KvcError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// robots.txt is refetched after this long.
const ROBOTS_TTL_SECONDS: i64 = 24 * 60 * 60;

pub struct PolitenessEnforcer<'a> {
    kvc: &'a KvClient,
    fetcher: Arc<Fetcher>,
    user_agent: String,
    min_delay_seconds: f64,
    cache: Mutex<HashMap<String, CachedRobots>>,
    /// Hosts excluded for the lifetime of the process without a KVC
    /// round-trip; populated at startup from the manual exclusion list
    /// and mirrored into `domain:<host>` for the frontier to see.
    excluded: HashSet<String>,
}

impl<'a> PolitenessEnforcer<'a> {
    pub fn new(
        kvc: &'a KvClient,
        fetcher: Arc<Fetcher>,
        user_agent: impl Into<String>,
        min_delay_seconds: f64,
        excluded: HashSet<String>,
    ) -> Self {
        Self {
            kvc,
            fetcher,
            user_agent: user_agent.into(),
            min_delay_seconds,
            cache: Mutex::new(HashMap::new()),
            excluded,
        }
    }

    /// Marks every host in the manual exclusion list as `is_excluded=1`
    /// in the KV service, so the frontier never reinserts them
    /// regardless of which worker claims them.
    pub async fn seed_exclusions(&self) -> Result<(), KvcError> {
        for host in &self.excluded {
            self.kvc
                .hset(&format!("domain:{}", host), "is_excluded", "1")
                .await?;
        }
        Ok(())
    }

    /// Returns `false` iff the host is manually excluded or robots.txt
    /// for the host disallows the URL path for the configured user agent.
    pub async fn is_url_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = ::url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        if self.excluded.contains(host) {
            return false;
        }

        let robots = self.robots_for(host).await;
        robots.is_allowed(parsed.as_str(), &self.user_agent)
    }

    /// Returns true iff wall-clock time is at or past the host's
    /// recorded `next_fetch_time`. A host with no recorded time yet is
    /// always eligible.
    pub async fn can_fetch_domain_now(&self, host: &str) -> bool {
        let Ok(Some(raw)) = self.kvc.hget(&format!("domain:{}", host), "next_fetch_time").await
        else {
            return true;
        };
        let Ok(next_fetch_ms) = raw.parse::<i64>() else {
            return true;
        };
        now_ms() >= next_fetch_ms
    }

    /// Records that a fetch to `host` was just attempted: the host's
    /// next eligible time becomes `now + min_delay`. Call
    /// [`PolitenessEnforcer::get_crawl_delay`] instead when the robots
    /// `Crawl-delay` should also be honored.
    pub async fn record_fetch_attempt(&self, host: &str) -> Result<(), KvcError> {
        let next = now_ms() + (self.min_delay_seconds * 1000.0) as i64;
        self.kvc
            .hset(&format!("domain:{}", host), "next_fetch_time", &next.to_string())
            .await
    }

    /// Effective delay in seconds before `host` may be fetched again:
    /// the site's `Crawl-delay` if it's at least the configured floor,
    /// else the floor itself.
    pub async fn get_crawl_delay(&self, host: &str) -> f64 {
        let robots = self.robots_for(host).await;
        super::effective_delay(&robots, &self.user_agent, self.min_delay_seconds)
    }

    /// Returns the cached, still-fresh robots policy for `host`,
    /// fetching and caching one if absent or stale. Checks the
    /// in-process cache first, then the durable KVC record, and only
    /// performs an HTTP fetch if both are empty or expired.
    async fn robots_for(&self, host: &str) -> CachedRobots {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(host) {
                if !cached.is_stale() {
                    return cached.clone();
                }
            }
        }

        if let Some(cached) = self.load_durable(host).await {
            if !cached.is_stale() {
                let mut cache = self.cache.lock().await;
                cache.insert(host.to_string(), cached.clone());
                return cached;
            }
        }

        let fetched = fetch_robots(&self.fetcher, host).await;
        self.store_durable(host, &fetched).await;
        let mut cache = self.cache.lock().await;
        cache.insert(host.to_string(), fetched.clone());
        fetched
    }

    async fn load_durable(&self, host: &str) -> Option<CachedRobots> {
        let domain_key = format!("domain:{}", host);
        let mut fields = self.kvc.hmget(&domain_key, &["robots_body", "robots_expires"]).await.ok()?.into_iter();
        let body = fields.next().flatten()?;
        let expires: i64 = fields.next().flatten()?.parse().ok()?;
        if now_ms() >= expires {
            return None;
        }
        let parsed = if body.is_empty() {
            ParsedRobots::allow_all()
        } else {
            ParsedRobots::from_content(&body)
        };
        let fetched_at_ms = expires - ROBOTS_TTL_SECONDS * 1000;
        let fetched_at = chrono::DateTime::from_timestamp_millis(fetched_at_ms).unwrap_or_else(chrono::Utc::now);
        Some(CachedRobots::from_fetched_at(parsed, fetched_at))
    }

    async fn store_durable(&self, host: &str, robots: &CachedRobots) {
        let domain_key = format!("domain:{}", host);
        let expires = now_ms() + ROBOTS_TTL_SECONDS * 1000;
        let body = robots.content.raw();
        let _ = self
            .kvc
            .hmset(
                &domain_key,
                &[("robots_body", body), ("robots_expires", &expires.to_string())],
            )
            .await;
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before 1970")
        .as_millis() as i64
}
