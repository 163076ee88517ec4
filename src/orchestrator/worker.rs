//! One fetch-worker task. The orchestrator spawns up to `--max-workers`
//! of these inside a single `tokio::runtime`; each is a cooperative loop
//! whose only suspension points are KVC operations, frontier file reads,
//! and the fetcher's HTTP call.

use crate::fetcher::{FetchOutcome, FetchType, Fetcher};
use crate::frontier::FrontierManager;
use crate::kvc::{fetch_queue, FetchQueueEntry, KvClient};
use crate::metrics;
use crate::politeness::PolitenessEnforcer;
use crate::storage::StorageService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A visited record is written with this status for URLs rejected by
/// the politeness enforcer before any network request was attempted.
/// Real HTTP statuses are 100-599 and the fetcher's synthetic failure
/// codes are 900-902, so 0 is free to mean "never attempted".
const DISALLOWED_STATUS: u16 = 0;

/// How long an idle worker sleeps when the frontier has nothing
/// claimable, so it doesn't busy-spin on an empty `domains:ready`.
const IDLE_SLEEP: Duration = Duration::from_millis(200);

pub async fn run(
    worker_id: usize,
    kvc: &KvClient,
    binary_kvc: &KvClient,
    fetcher: &Fetcher,
    politeness: &PolitenessEnforcer<'_>,
    storage: &StorageService<'_>,
    data_dir: &std::path::Path,
    shutdown: Arc<AtomicBool>,
) {
    let frontier = FrontierManager::new(kvc, data_dir);

    while !shutdown.load(Ordering::Relaxed) {
        let Some(claimed) = frontier.claim().await.unwrap_or_else(|e| {
            tracing::warn!(worker_id, error = %e, "frontier claim failed");
            None
        }) else {
            tokio::time::sleep(IDLE_SLEEP).await;
            continue;
        };

        let host = claimed.host.clone();
        process_claim(&claimed.url, &claimed.host, claimed.depth, fetcher, politeness, storage, binary_kvc).await;

        let delay = politeness.get_crawl_delay(&host).await;
        if let Err(e) = frontier.release(&host, delay).await {
            tracing::warn!(worker_id, host, error = %e, "frontier release failed");
        }
    }
}

async fn process_claim(
    url: &str,
    host: &str,
    depth: u32,
    fetcher: &Fetcher,
    politeness: &PolitenessEnforcer<'_>,
    storage: &StorageService<'_>,
    binary_kvc: &KvClient,
) {
    if !politeness.is_url_allowed(url).await {
        if let Err(e) = storage
            .record_fetch(url, host, DISALLOWED_STATUS, now_ms(), None, Some("disallowed"))
            .await
        {
            tracing::warn!(url, error = %e, "failed to record disallowed visit");
        }
        return;
    }

    if !politeness.can_fetch_domain_now(host).await {
        // Ready-set drift: the domain was claimed slightly before its
        // delay elapsed. Release and let it come back around rather
        // than busy-waiting in place.
        return;
    }

    if let Err(e) = politeness.record_fetch_attempt(host).await {
        tracing::warn!(host, error = %e, "failed to record fetch attempt");
    }

    let outcome = fetcher.fetch(url, host, FetchType::Page).await;
    metrics::record_fetch("page", outcome.error_type().as_deref(), outcome.timing().dns, outcome.timing().total);
    metrics::record_page_visited();

    let entry = match outcome {
        FetchOutcome::Success { final_url, status_code, content_type, body, .. } => FetchQueueEntry {
            url: url.to_string(),
            host: host.to_string(),
            depth,
            final_url,
            status_code,
            content_type,
            body,
            fetched_at: now_ms(),
        },
        other => FetchQueueEntry {
            url: url.to_string(),
            host: host.to_string(),
            depth,
            final_url: url.to_string(),
            status_code: other.status_code(),
            content_type: String::new(),
            body: Vec::new(),
            fetched_at: now_ms(),
        },
    };

    if let Err(e) = fetch_queue::push(binary_kvc, &entry).await {
        tracing::error!(url, error = %e, "failed to push fetch queue entry");
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before 1970")
        .as_millis() as i64
}
