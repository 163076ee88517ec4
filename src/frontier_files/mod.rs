//! Frontier Files: append-only per-domain logs of discovered URLs.
//!
//! Each domain gets its own file at `frontier/<bucket>/<host>.frontier`,
//! where `bucket` is the first two hex characters of SHA-256(host) —
//! the same two-character sharding idea the content store uses, applied
//! to hostnames instead of content hashes so a single directory never
//! ends up with millions of entries. A file is a sequence of
//! `<url>\t<depth>\n` lines; the current read position for a domain is
//! tracked externally (`frontier_offset` in the KVC domain hash), so
//! appends from a live crawl and reads from a resumed one never race.

use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierFileError {
    #[error("I/O error on frontier file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frontier entry: {0}")]
    Malformed(String),
}

pub fn bucket_for_host(host: &str) -> String {
    let digest = Sha256::digest(host.as_bytes());
    hex::encode(&digest[..1])
}

pub fn path_for_host(data_dir: &Path, host: &str) -> PathBuf {
    data_dir
        .join("frontier")
        .join(bucket_for_host(host))
        .join(format!("{}.frontier", host))
}

/// Appends one or more discovered URLs for `host` in a single open/write/
/// flush round-trip, and returns the file's size in bytes immediately
/// after the append — the value the caller stores as `frontier_size` in
/// the domain's KVC hash. Creates the bucket directory and the file on
/// first use. `records` must be non-empty.
pub fn append(data_dir: &Path, host: &str, records: &[(&str, u32)]) -> Result<u64, FrontierFileError> {
    let path = path_for_host(data_dir, host);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for (url, depth) in records {
        writeln!(file, "{}\t{}", url, depth)?;
    }
    Ok(file.metadata()?.len())
}

/// Total size of the frontier file in bytes, or 0 if it doesn't exist
/// yet.
pub fn len_bytes(data_dir: &Path, host: &str) -> Result<u64, FrontierFileError> {
    let path = path_for_host(data_dir, host);
    match fs::metadata(&path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Reads the single entry starting at byte `offset` and returns it
/// along with the offset of the next entry. Returns `None` if `offset`
/// is at or past the end of the file (nothing unread).
pub fn read_one(
    data_dir: &Path,
    host: &str,
    offset: u64,
) -> Result<Option<(String, u32, u64)>, FrontierFileError> {
    let path = path_for_host(data_dir, host);
    let mut file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if offset >= file.metadata()?.len() {
        return Ok(None);
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line)?;
    if bytes_read == 0 {
        return Ok(None);
    }

    let trimmed = line.trim_end_matches('\n');
    let (url, depth_str) = trimmed
        .rsplit_once('\t')
        .ok_or_else(|| FrontierFileError::Malformed(trimmed.to_string()))?;
    let depth: u32 = depth_str
        .parse()
        .map_err(|_| FrontierFileError::Malformed(trimmed.to_string()))?;

    Ok(Some((url.to_string(), depth, offset + bytes_read as u64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bucket_deterministic() {
        assert_eq!(bucket_for_host("example.com"), bucket_for_host("example.com"));
        assert_eq!(bucket_for_host("example.com").len(), 2);
    }

    #[test]
    fn test_append_and_read_sequence() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "example.com", &[("https://example.com/a", 0)]).unwrap();
        append(dir.path(), "example.com", &[("https://example.com/b", 1)]).unwrap();

        let (url1, depth1, offset1) = read_one(dir.path(), "example.com", 0).unwrap().unwrap();
        assert_eq!(url1, "https://example.com/a");
        assert_eq!(depth1, 0);

        let (url2, depth2, offset2) = read_one(dir.path(), "example.com", offset1).unwrap().unwrap();
        assert_eq!(url2, "https://example.com/b");
        assert_eq!(depth2, 1);

        assert!(read_one(dir.path(), "example.com", offset2).unwrap().is_none());
    }

    #[test]
    fn test_read_one_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_one(dir.path(), "nope.com", 0).unwrap().is_none());
    }

    #[test]
    fn test_len_bytes_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(len_bytes(dir.path(), "nope.com").unwrap(), 0);
    }

    #[test]
    fn test_len_bytes_grows_with_appends() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "example.com", &[("https://example.com/a", 0)]).unwrap();
        let first = len_bytes(dir.path(), "example.com").unwrap();
        append(dir.path(), "example.com", &[("https://example.com/b", 0)]).unwrap();
        let second = len_bytes(dir.path(), "example.com").unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_offset_past_end_returns_none() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "example.com", &[("https://example.com/a", 0)]).unwrap();
        let len = len_bytes(dir.path(), "example.com").unwrap();
        assert!(read_one(dir.path(), "example.com", len).unwrap().is_none());
    }

    #[test]
    fn test_append_batch_returns_post_append_size() {
        let dir = TempDir::new().unwrap();
        let size = append(
            dir.path(),
            "example.com",
            &[("https://example.com/a", 0), ("https://example.com/b", 1)],
        )
        .unwrap();
        assert_eq!(size, len_bytes(dir.path(), "example.com").unwrap());

        let (url1, depth1, offset1) = read_one(dir.path(), "example.com", 0).unwrap().unwrap();
        assert_eq!(url1, "https://example.com/a");
        assert_eq!(depth1, 0);
        let (url2, depth2, offset2) = read_one(dir.path(), "example.com", offset1).unwrap().unwrap();
        assert_eq!(url2, "https://example.com/b");
        assert_eq!(depth2, 1);
        assert_eq!(offset2, size);
    }
}
