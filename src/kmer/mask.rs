// src/kmer/mask.rs
//! Spaced-seed mask.
//!
//! A seed is a string of k characters over {0,1}; positions marked '0' are
//! "don't care" and do not participate in k-mer equality or hashing. The
//! mask must be symmetric (mask[i] == mask[k-1-i]) so that canonicalization
//! commutes with masking.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::kmer::kmer::Kmer;

static ACTIVE_MASK: RwLock<Option<Arc<SeedMask>>> = RwLock::new(None);

/// Errors from parsing a spaced seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
    /// Length differs from the configured k.
    WrongLength,
    /// A character other than '0' or '1'.
    BadChar(char),
    /// mask[i] != mask[k-1-i] for some i.
    Asymmetric,
    /// No position marked '1'.
    Empty,
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskError::WrongLength => write!(f, "seed length does not equal k"),
            MaskError::BadChar(c) => write!(f, "seed contains '{}', expected 0 or 1", c),
            MaskError::Asymmetric => write!(f, "seed is not symmetric"),
            MaskError::Empty => write!(f, "seed has no '1' positions"),
        }
    }
}

impl std::error::Error for MaskError {}

/// A validated spaced-seed mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedMask {
    cares: Vec<bool>,
}

impl SeedMask {
    /// Parse and validate a seed against the configured k.
    pub fn parse(seed: &str) -> Result<SeedMask, MaskError> {
        let k = Kmer::length();
        if seed.len() != k {
            return Err(MaskError::WrongLength);
        }
        let mut cares = Vec::with_capacity(k);
        for c in seed.chars() {
            match c {
                '0' => cares.push(false),
                '1' => cares.push(true),
                other => return Err(MaskError::BadChar(other)),
            }
        }
        for i in 0..k / 2 {
            if cares[i] != cares[k - 1 - i] {
                return Err(MaskError::Asymmetric);
            }
        }
        if !cares.iter().any(|&c| c) {
            return Err(MaskError::Empty);
        }
        Ok(SeedMask { cares })
    }

    /// Whether position `i` participates in equality and hashing.
    #[inline]
    pub fn cares(&self, i: usize) -> bool {
        self.cares[i]
    }

    /// Number of '1' positions.
    pub fn weight(&self) -> usize {
        self.cares.iter().filter(|&&c| c).count()
    }

    /// Install `mask` as the process-wide seed. Passing None disables
    /// masking. Set once at startup, before any k-mer is inserted.
    pub fn install(mask: Option<SeedMask>) {
        *ACTIVE_MASK.write().unwrap() = mask.map(Arc::new);
    }

    /// The active seed, if any.
    pub fn active() -> Option<Arc<SeedMask>> {
        ACTIVE_MASK.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::test_lock;

    #[test]
    fn parse_validates() {
        let _guard = test_lock();
        Kmer::set_length(5);
        assert!(SeedMask::parse("11011").is_ok());
        assert_eq!(SeedMask::parse("1101"), Err(MaskError::WrongLength));
        assert_eq!(SeedMask::parse("11010"), Err(MaskError::Asymmetric));
        assert_eq!(SeedMask::parse("00000"), Err(MaskError::Empty));
        assert_eq!(SeedMask::parse("11x11"), Err(MaskError::BadChar('x')));
    }

    #[test]
    fn masked_equality_and_hash() {
        let _guard = test_lock();
        Kmer::set_length(5);
        SeedMask::install(Some(SeedMask::parse("11011").unwrap()));
        let a = Kmer::from_str("ACGTA").unwrap();
        let b = Kmer::from_str("ACTTA").unwrap();
        // Differ only at the masked-out center position.
        assert_eq!(a, b);
        let mut set = ahash::AHashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        SeedMask::install(None);
    }
}
