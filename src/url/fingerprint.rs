use sha2::{Digest, Sha256};
use url::Url;

/// Stable identity for a canonicalized URL, used for frontier
/// dedup (Bloom filter membership) and visited-record keys.
pub fn fingerprint(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let url = Url::parse("https://example.com/page").unwrap();
        assert_eq!(fingerprint(&url), fingerprint(&url));
    }

    #[test]
    fn test_fingerprint_differs_by_url() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b").unwrap();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256_length() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(fingerprint(&url).len(), 64);
    }
}
