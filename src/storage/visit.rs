//! Visit record protocol: `HMSET visited:<urlsha256>` in the KV
//! service. This is the system of record for what's been crawled;
//! the local SQLite mirror (`src/storage/mirror.rs`) is a reporting
//! copy derived from the same calls, never the other way around.

use crate::kvc::{KvClient, KvcError};
use crate::url::fingerprint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("kvc error: {0}")]
    Kvc(#[from] KvcError),
    #[error("malformed URL in visit record: {0}")]
    Url(String),
    #[error("content store error: {0}")]
    Content(#[from] super::ContentStoreError),
}

/// One URL's visit outcome, ready to persist.
#[derive(Debug, Clone)]
pub struct VisitRecord<'a> {
    pub url: &'a str,
    pub domain: &'a str,
    pub status_code: u16,
    pub fetched_at: i64,
    pub content_hash: Option<&'a str>,
    pub content_path: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// `url` must already be normalized — this is the same [`fingerprint`]
/// the frontier's seen-URL filter and add-URLs protocol use, so a
/// visit record and a frontier entry for the same URL always agree.
fn visited_key(url: &str) -> Result<String, VisitError> {
    let parsed = ::url::Url::parse(url).map_err(|e| VisitError::Url(e.to_string()))?;
    Ok(format!("visited:{}", fingerprint(&parsed)))
}

/// Writes (or overwrites) the visit record for `record.url`. Later
/// calls for the same URL fully replace the earlier record rather than
/// merging fields: any of `content_hash`/`content_path`/`error` absent
/// from this call is explicitly `HDEL`'d so a stale value from an
/// earlier visit (e.g. a prior fetch's error message surviving a later
/// successful re-fetch) never lingers.
pub async fn record_visit(client: &KvClient, record: &VisitRecord<'_>) -> Result<(), VisitError> {
    let key = visited_key(record.url)?;
    let fetched_at = record.fetched_at.to_string();
    let status_code = record.status_code.to_string();
    let mut fields: Vec<(&str, &str)> = vec![
        ("url", record.url),
        ("domain", record.domain),
        ("status_code", &status_code),
        ("fetched_at", &fetched_at),
    ];
    let mut absent: Vec<&str> = Vec::new();

    match record.content_hash {
        Some(hash) => fields.push(("content_hash", hash)),
        None => absent.push("content_hash"),
    }
    match record.content_path {
        Some(path) => fields.push(("content_path", path)),
        None => absent.push("content_path"),
    }
    match record.error {
        Some(error) => fields.push(("error", error)),
        None => absent.push("error"),
    }

    client.hmset(&key, &fields).await?;
    client.hdel(&key, &absent).await?;
    Ok(())
}

/// Returns `true` iff `url` already has a visit record.
pub async fn has_visited(client: &KvClient, url: &str) -> Result<bool, VisitError> {
    let key = visited_key(url)?;
    Ok(!client.hgetall(&key).await?.is_empty())
}
