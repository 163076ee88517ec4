//! Approximate-membership filter ("seen before?") hosted directly on a
//! Redis bitmap via `SETBIT`/`GETBIT`, rather than a dedicated
//! Bloom-filter crate — the filter's state needs to live in the same
//! external service as everything else the crawler shares across
//! restarts, and a bitmap is all a Bloom filter needs.

use super::{KvClient, KvcError};
use sha2::{Digest, Sha256};

/// Number of hash functions. 7 is the standard choice for a filter
/// sized to keep the false-positive rate low at the expected URL count
/// without needing per-deployment tuning.
const NUM_HASHES: u32 = 7;

pub struct BloomFilter<'a> {
    client: &'a KvClient,
    key: String,
    num_bits: usize,
}

impl<'a> BloomFilter<'a> {
    /// `num_bits` is the bitmap size; callers size it for their
    /// expected URL count and target false-positive rate ahead of time.
    pub fn new(client: &'a KvClient, key: impl Into<String>, num_bits: usize) -> Self {
        Self { client, key: key.into(), num_bits }
    }

    fn offsets(&self, fingerprint: &[u8]) -> Vec<usize> {
        (0..NUM_HASHES)
            .map(|seed| {
                let mut hasher = Sha256::new();
                hasher.update(fingerprint);
                hasher.update(seed.to_be_bytes());
                let digest = hasher.finalize();
                let value = u64::from_be_bytes(digest[0..8].try_into().unwrap());
                (value as usize) % self.num_bits
            })
            .collect()
    }

    /// Returns `true` if `fingerprint` was (probably) already added.
    /// False positives are possible; false negatives are not.
    pub async fn contains(&self, fingerprint: &[u8]) -> Result<bool, KvcError> {
        let offsets = self.offsets(fingerprint);
        let bits = self.client.getbit_many(&self.key, &offsets).await?;
        Ok(bits.into_iter().all(|b| b))
    }

    pub async fn insert(&self, fingerprint: &[u8]) -> Result<(), KvcError> {
        let offsets = self.offsets(fingerprint);
        self.client.setbit_many(&self.key, &offsets).await
    }

    /// Tests membership and inserts in one call, returning whether the
    /// fingerprint was already present. This still costs two
    /// round-trips (test, then insert) rather than one, since a single
    /// pipeline can't branch on its own read results.
    pub async fn test_and_set(&self, fingerprint: &[u8]) -> Result<bool, KvcError> {
        let already_present = self.contains(fingerprint).await?;
        if !already_present {
            self.insert(fingerprint).await?;
        }
        Ok(already_present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_deterministic_and_within_range() {
        // Construct without a real client: offsets() doesn't touch it.
        let num_bits = 1 << 20;
        let hash_offsets = |fingerprint: &[u8]| -> Vec<usize> {
            (0..NUM_HASHES)
                .map(|seed| {
                    let mut hasher = Sha256::new();
                    hasher.update(fingerprint);
                    hasher.update(seed.to_be_bytes());
                    let digest = hasher.finalize();
                    let value = u64::from_be_bytes(digest[0..8].try_into().unwrap());
                    (value as usize) % num_bits
                })
                .collect()
        };
        let a = hash_offsets(b"https://example.com/");
        let b = hash_offsets(b"https://example.com/");
        assert_eq!(a, b);
        assert_eq!(a.len(), NUM_HASHES as usize);
        assert!(a.iter().all(|&o| o < num_bits));
    }

    #[test]
    fn test_offsets_differ_for_different_input() {
        let num_bits = 1 << 20;
        let hash_offsets = |fingerprint: &[u8]| -> Vec<usize> {
            (0..NUM_HASHES)
                .map(|seed| {
                    let mut hasher = Sha256::new();
                    hasher.update(fingerprint);
                    hasher.update(seed.to_be_bytes());
                    let digest = hasher.finalize();
                    let value = u64::from_be_bytes(digest[0..8].try_into().unwrap());
                    (value as usize) % num_bits
                })
                .collect()
        };
        assert_ne!(hash_offsets(b"a"), hash_offsets(b"b"));
    }
}
