//! Bloom filter for exact fingerprint membership.
//!
//! Sized from an expected element cap and a target false-positive rate. Bit
//! positions come from double hashing over a SHA-256 digest of the item, so
//! the layout is deterministic across runs and platforms.

use sha2::{Digest, Sha256};

/// Probabilistic set with no false negatives.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    bit_count: u64,
    hash_count: u32,
    inserted: usize,
}

impl BloomFilter {
    /// Creates a filter for `capacity` elements at roughly `error_rate` false positives.
    ///
    /// Uses the standard sizing `m = -n ln p / (ln 2)^2` and `k = m/n ln 2`.
    pub fn new(capacity: usize, error_rate: f64) -> Self {
        let n = capacity.max(1) as f64;
        let bits = Self::required_bits(capacity, error_rate);
        let hash_count = ((bits as f64 / n) * std::f64::consts::LN_2).round().max(1.0) as u32;
        let word_count = bits.div_ceil(64) as usize;

        Self {
            words: vec![0u64; word_count],
            bit_count: word_count as u64 * 64,
            hash_count,
            inserted: 0,
        }
    }

    /// Bit array size `new` would allocate for these parameters
    pub fn required_bits(capacity: usize, error_rate: f64) -> u64 {
        let n = capacity.max(1) as f64;
        let p = error_rate.clamp(f64::MIN_POSITIVE, 0.5);
        let ln2 = std::f64::consts::LN_2;
        (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64
    }

    /// Inserts an item; returns true if any bit was newly set.
    pub fn insert(&mut self, item: &[u8]) -> bool {
        let mut changed = false;
        for idx in self.bit_indexes(item) {
            let (word, mask) = (idx / 64, 1u64 << (idx % 64));
            if self.words[word as usize] & mask == 0 {
                self.words[word as usize] |= mask;
                changed = true;
            }
        }
        if changed {
            self.inserted += 1;
        }
        changed
    }

    /// Tests membership. May return true for an item never inserted.
    pub fn contains(&self, item: &[u8]) -> bool {
        self.bit_indexes(item)
            .all(|idx| self.words[(idx / 64) as usize] & (1u64 << (idx % 64)) != 0)
    }

    /// Number of insertions that changed the filter
    pub fn len(&self) -> usize {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Number of hash functions in use
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Size of the bit array
    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    fn bit_indexes(&self, item: &[u8]) -> impl Iterator<Item = u64> {
        let digest = Sha256::digest(item);
        let mut first = [0u8; 8];
        let mut second = [0u8; 8];
        first.copy_from_slice(&digest[0..8]);
        second.copy_from_slice(&digest[8..16]);

        let h1 = u64::from_le_bytes(first);
        // Odd step so successive probes never collapse onto one bit
        let h2 = u64::from_le_bytes(second) | 1;
        let bit_count = self.bit_count;

        (0..self.hash_count as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % bit_count)
    }
}
