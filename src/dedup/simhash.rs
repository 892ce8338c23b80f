//! 64-bit Simhash signatures and a Hamming-distance index over them.
//!
//! Text is lowercased, reduced to word characters, and split into
//! overlapping 4-character shingles. Each shingle votes on every bit of the
//! signature with a weight equal to its occurrence count.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

const SIGNATURE_BITS: u32 = 64;
const SHINGLE_WIDTH: usize = 4;

/// Fixed-width similarity signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Simhash(u64);

impl Simhash {
    /// Computes the signature of a piece of text
    pub fn of(text: &str) -> Self {
        let mut weights = [0i64; SIGNATURE_BITS as usize];

        for (feature, count) in shingles(text) {
            let hash = feature_hash(&feature);
            for (bit, weight) in weights.iter_mut().enumerate() {
                if hash & (1u64 << bit) != 0 {
                    *weight += count;
                } else {
                    *weight -= count;
                }
            }
        }

        let value = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0)
            .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit));

        Self(value)
    }

    pub fn from_value(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Number of differing bits
    pub fn distance(&self, other: &Simhash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

fn shingles(text: &str) -> BTreeMap<String, i64> {
    let cleaned: Vec<char> = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    let mut features = BTreeMap::new();
    let windows = cleaned.len().saturating_sub(SHINGLE_WIDTH) + 1;
    for start in 0..windows {
        let end = (start + SHINGLE_WIDTH).min(cleaned.len());
        let feature: String = cleaned[start..end].iter().collect();
        *features.entry(feature).or_insert(0) += 1;
    }
    features
}

fn feature_hash(feature: &str) -> u64 {
    let digest = Sha256::digest(feature.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}

/// Index answering "is any stored signature within `k` bits of this one?"
///
/// Signatures are split into `k + 1` bit blocks. Two signatures within
/// distance `k` must agree on at least one whole block, so only signatures
/// sharing a block value with the query are compared.
#[derive(Debug, Clone)]
pub struct SimhashIndex {
    k: u32,
    blocks: Vec<(u32, u64)>,
    buckets: HashMap<(usize, u64), Vec<Simhash>>,
    len: usize,
}

impl SimhashIndex {
    pub fn new(k: u32) -> Self {
        let block_count = (k + 1).min(SIGNATURE_BITS);
        let width = SIGNATURE_BITS / block_count;

        let blocks = (0..block_count)
            .map(|i| {
                let offset = i * width;
                let bits = if i == block_count - 1 {
                    SIGNATURE_BITS - offset
                } else {
                    width
                };
                let mask = if bits == SIGNATURE_BITS {
                    u64::MAX
                } else {
                    (1u64 << bits) - 1
                };
                (offset, mask)
            })
            .collect();

        Self {
            k,
            blocks,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Returns a stored signature within the distance threshold, if any
    pub fn near_duplicate_of(&self, hash: &Simhash) -> Option<Simhash> {
        self.keys(hash).find_map(|key| {
            self.buckets.get(&key).and_then(|bucket| {
                bucket
                    .iter()
                    .find(|candidate| candidate.distance(hash) <= self.k)
                    .copied()
            })
        })
    }

    pub fn has_near_duplicate(&self, hash: &Simhash) -> bool {
        self.near_duplicate_of(hash).is_some()
    }

    pub fn add(&mut self, hash: Simhash) {
        let keys: Vec<_> = self.keys(&hash).collect();
        for key in keys {
            self.buckets.entry(key).or_default().push(hash);
        }
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn distance_threshold(&self) -> u32 {
        self.k
    }

    fn keys<'a>(&'a self, hash: &Simhash) -> impl Iterator<Item = (usize, u64)> + 'a {
        let value = hash.value();
        self.blocks
            .iter()
            .enumerate()
            .map(move |(i, (offset, mask))| (i, (value >> offset) & mask))
    }
}
