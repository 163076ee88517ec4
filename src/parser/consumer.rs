//! Parser Consumer worker loop: pops a fetched page off the Fetch
//! Queue, extracts its links, feeds new ones back to the frontier, and
//! records the visit. Runs as its own `tokio::spawn`'d task inside the
//! `sumi-parser` process; the orchestrator runs several of these
//! processes side by side, each with its own pool of these in-process
//! tasks.

use crate::frontier::FrontierManager;
use crate::kvc::{fetch_queue, FetchQueueEntry, KvClient};
use crate::parser::html::parse_html;
use crate::storage::StorageService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs one consumer loop until `shutdown` is set. Blocks on the Fetch
/// Queue with a short timeout so the shutdown flag is rechecked
/// regularly even when the queue is empty.
pub async fn run(kvc: &KvClient, data_dir: &std::path::Path, shutdown: Arc<AtomicBool>) {
    let frontier = FrontierManager::new(kvc, data_dir);
    let storage = StorageService::new(data_dir, kvc);

    while !shutdown.load(Ordering::Relaxed) {
        match fetch_queue::pop(kvc).await {
            Ok(Some(entry)) => {
                if let Err(e) = process_entry(&frontier, &storage, &entry).await {
                    tracing::warn!(url = %entry.url, error = %e, "failed to process fetch queue entry");
                }
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(error = %e, "fetch queue pop failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

async fn process_entry(
    frontier: &FrontierManager<'_>,
    storage: &StorageService<'_>,
    entry: &FetchQueueEntry,
) -> Result<(), crate::storage::VisitError> {
    let is_html = entry.content_type.starts_with("text/html")
        || entry.content_type.starts_with("application/xhtml+xml");

    let mut added_links = 0usize;
    if is_html && entry.status_code / 100 == 2 {
        if let Ok(base) = ::url::Url::parse(&entry.final_url) {
            if let Ok(body) = std::str::from_utf8(&entry.body) {
                match parse_html(body, &base) {
                    Ok(parsed) => {
                        if !parsed.links.is_empty() {
                            added_links = frontier
                                .add_urls(&parsed.links, entry.depth)
                                .await
                                .unwrap_or_else(|e| {
                                    tracing::warn!(error = %e, "failed to add extracted links");
                                    0
                                });
                        }
                    }
                    Err(e) => tracing::debug!(url = %entry.url, error = %e, "html parse failed"),
                }
            }
        }
    }

    let error_label = (entry.status_code >= 400).then(|| format!("http_{}", entry.status_code));
    let body = (!entry.body.is_empty()).then(|| entry.body.as_slice());
    storage
        .record_fetch(&entry.url, &entry.host, entry.status_code, entry.fetched_at, body, error_label.as_deref())
        .await?;

    tracing::debug!(url = %entry.url, links_added = added_links, "processed fetch queue entry");
    Ok(())
}
