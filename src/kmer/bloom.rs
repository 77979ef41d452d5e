// src/kmer/bloom.rs
//! Bloom filter for singleton k-mer pre-filtering.
//!
//! Most distinct k-mers in error-bearing reads occur exactly once and
//! never belong in the graph. Priming a Bloom filter with the first
//! occurrence and admitting a k-mer to the hash table only on a repeat
//! observation keeps those singletons out of the table entirely. False
//! positives let the odd singleton through; false negatives cannot occur.
//!
//! The filter is word-atomic, so loader threads share it without locking.

use std::sync::atomic::{AtomicU64, Ordering};

/// A fixed-size Bloom filter addressed by precomputed hash values (see
/// [`crate::kmer::RollingHash::hashes`]).
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    num_bits: usize,
}

impl BloomFilter {
    /// Size the filter for an expected item count and false-positive rate.
    pub fn with_fp_rate(expected_items: usize, fp_rate: f64) -> BloomFilter {
        // Optimal bits: m = -n ln(p) / (ln 2)^2.
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let num_bits = (-(expected_items.max(1) as f64) * fp_rate.ln() / ln2_sq).ceil() as usize;
        BloomFilter::with_bits(num_bits)
    }

    /// Size the filter to a memory budget.
    pub fn with_memory(bytes: usize) -> BloomFilter {
        BloomFilter::with_bits(bytes.max(8) * 8)
    }

    fn with_bits(num_bits: usize) -> BloomFilter {
        let num_bits = num_bits.div_ceil(64) * 64;
        let words = num_bits / 64;
        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));
        BloomFilter { bits, num_bits }
    }

    #[inline]
    fn slot(&self, hash: u64) -> (usize, u64) {
        let bit = (hash as usize) % self.num_bits;
        (bit / 64, 1u64 << (bit % 64))
    }

    /// Set the bits for `hashes`.
    #[inline]
    pub fn insert(&self, hashes: &[u64]) {
        for &h in hashes {
            let (word, mask) = self.slot(h);
            self.bits[word].fetch_or(mask, Ordering::Relaxed);
        }
    }

    /// Whether all bits for `hashes` are set.
    #[inline]
    pub fn contains(&self, hashes: &[u64]) -> bool {
        hashes.iter().all(|&h| {
            let (word, mask) = self.slot(h);
            self.bits[word].load(Ordering::Relaxed) & mask != 0
        })
    }

    /// Insert and report whether the item was already (possibly) present.
    /// The combined fetch_or keeps the check-and-set race-free per bit.
    #[inline]
    pub fn insert_and_check(&self, hashes: &[u64]) -> bool {
        let mut present = true;
        for &h in hashes {
            let (word, mask) = self.slot(h);
            let previous = self.bits[word].fetch_or(mask, Ordering::Relaxed);
            present &= previous & mask != 0;
        }
        present
    }
}
