//! K-mer core: packed value type, spaced-seed mask, rolling hash.

pub mod bloom;
pub mod kmer;
pub mod mask;
pub mod nthash;

pub use kmer::{Dir, Kmer, KmerError};
pub use mask::{MaskError, SeedMask};
pub use nthash::{RollingHash, RollingHashIter, MAX_HASHES};

/// Unit tests mutate the process-wide k and seed; hold this lock around any
/// test that calls `Kmer::set_length` or `SeedMask::install`.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
