//! Storage Service: content-addressed bodies plus visit records in the
//! KV service — the system of record for what's been crawled.

mod content;
mod visit;

pub use content::{ContentStore, ContentStoreError, WriteResult};
pub use visit::{has_visited, record_visit, VisitError, VisitRecord};

use std::path::Path;

/// Façade pairing the content-addressed body store with the KVC visit
/// record protocol — what PC and FE actually call, rather than each
/// reaching for [`ContentStore`] and [`record_visit`] separately.
pub struct StorageService<'a> {
    content: ContentStore,
    kvc: &'a crate::kvc::KvClient,
}

impl<'a> StorageService<'a> {
    pub fn new(data_dir: impl AsRef<Path>, kvc: &'a crate::kvc::KvClient) -> Self {
        Self { content: ContentStore::new(data_dir), kvc }
    }

    /// Writes `body` to the content store (if not already present) and
    /// records the visit outcome, linking the two via `content_hash`/
    /// `content_path`. A content object is written iff `status_code` is
    /// 2xx and `body` is non-empty (§8.5); any body passed alongside a
    /// non-2xx status is simply not stored, so callers don't each need
    /// to gate on status themselves.
    pub async fn record_fetch(
        &self,
        url: &str,
        domain: &str,
        status_code: u16,
        fetched_at: i64,
        body: Option<&[u8]>,
        error: Option<&str>,
    ) -> Result<Option<WriteResult>, VisitError> {
        let is_success = (200..300).contains(&status_code);
        let write = match body {
            Some(bytes) if is_success && !bytes.is_empty() => Some(self.content.write(bytes)?),
            _ => None,
        };

        let path_string = write.as_ref().map(|w| w.path.to_string_lossy().into_owned());
        record_visit(
            self.kvc,
            &VisitRecord {
                url,
                domain,
                status_code,
                fetched_at,
                content_hash: write.as_ref().map(|w| w.sha256.as_str()),
                content_path: path_string.as_deref(),
                error,
            },
        )
        .await?;

        Ok(write)
    }
}
