//! Fetch Queue: a binary-serialized FIFO handed from fetch workers to
//! the out-of-process Parser Consumer. Durable across PC restarts since
//! it's just a Redis list — entries pushed before a crash are still
//! there when the supervisor brings PC back up.

use super::{KvClient, KvcError};
use serde::{Deserialize, Serialize};

const QUEUE_KEY: &str = "fetch_queue";
/// How long a blocking pop waits before returning empty, so the
/// consumer can check its shutdown flag between attempts.
const POP_TIMEOUT_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchQueueEntry {
    pub url: String,
    pub host: String,
    pub depth: u32,
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Epoch milliseconds at which the fetch completed.
    pub fetched_at: i64,
}

impl FetchQueueEntry {
    pub fn encode(&self) -> Result<Vec<u8>, KvcError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, KvcError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

pub async fn push(client: &KvClient, entry: &FetchQueueEntry) -> Result<(), KvcError> {
    client.rpush(QUEUE_KEY, entry.encode()?).await
}

/// Blocks up to [`POP_TIMEOUT_SECONDS`]; returns `None` on timeout.
pub async fn pop(client: &KvClient) -> Result<Option<FetchQueueEntry>, KvcError> {
    match client.blpop(QUEUE_KEY, POP_TIMEOUT_SECONDS).await? {
        Some(bytes) => Ok(Some(FetchQueueEntry::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn len(client: &KvClient) -> Result<i64, KvcError> {
    client.llen(QUEUE_KEY).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_encode_decode() {
        let entry = FetchQueueEntry {
            url: "https://example.com/".to_string(),
            host: "example.com".to_string(),
            depth: 2,
            final_url: "https://example.com/".to_string(),
            status_code: 200,
            content_type: "text/html".to_string(),
            body: b"<html></html>".to_vec(),
            fetched_at: 1_700_000_000_000,
        };
        let bytes = entry.encode().unwrap();
        let decoded = FetchQueueEntry::decode(&bytes).unwrap();
        assert_eq!(entry, decoded);
    }
}
