// src/kmer/kmer.rs
//! Packed k-mer value type.
//!
//! A k-mer is stored 2 bits per base in a single u64 for k <= 32, and as a
//! heap-allocated code array for 32 < k <= 128. The k-mer length is a
//! process-wide constant set once before any sequence is loaded; the k-range
//! driver re-sets it between passes, each of which builds a fresh collection.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::kmer::mask::SeedMask;

/// Maximum supported k-mer length.
pub const MAX_K: usize = 128;

static KMER_LENGTH: AtomicUsize = AtomicUsize::new(0);

/// Direction of extension along a strand.
///
/// `Sense` extends the 3' end (append right), `Antisense` the 5' end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir {
    Sense,
    Antisense,
}

impl Dir {
    /// The opposite direction.
    #[inline]
    pub fn flip(self) -> Dir {
        match self {
            Dir::Sense => Dir::Antisense,
            Dir::Antisense => Dir::Sense,
        }
    }

    /// Index into per-strand tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Dir::Sense => 0,
            Dir::Antisense => 1,
        }
    }
}

/// Errors from parsing a k-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmerError {
    /// A character outside {A, C, G, T} at a position the mask requires.
    NotAcgt,
    /// Input length differs from the configured k.
    WrongLength,
}

impl fmt::Display for KmerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KmerError::NotAcgt => write!(f, "sequence contains a non-ACGT base"),
            KmerError::WrongLength => write!(f, "sequence length does not equal k"),
        }
    }
}

impl std::error::Error for KmerError {}

/// 2-bit code for a base. Returns None for anything outside ACGT.
#[inline]
pub fn base_code(b: u8) -> Option<u8> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// The base character for a 2-bit code.
#[inline]
pub fn code_base(code: u8) -> u8 {
    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    BASES[(code & 3) as usize]
}

/// Complement of a 2-bit code (A<->T, C<->G).
#[inline]
pub fn complement_code(code: u8) -> u8 {
    3 - (code & 3)
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Repr {
    /// 2-bit packed, most significant pair is the first base.
    Packed(u64),
    /// 2-bit base codes, one byte per position.
    Heap(Box<[u8]>),
}

/// A DNA k-mer of the process-wide length.
///
/// Equality and hashing honor the active spaced seed: masked-out positions
/// are ignored. Without a seed they compare all positions.
#[derive(Clone, Eq)]
pub struct Kmer {
    repr: Repr,
}

impl Kmer {
    /// Set the process-wide k-mer length. Must be called before any k-mer is
    /// constructed, and only between assembly passes.
    pub fn set_length(k: usize) {
        assert!((2..=MAX_K).contains(&k), "k must be in 2..={}", MAX_K);
        KMER_LENGTH.store(k, Ordering::SeqCst);
    }

    /// The configured k-mer length.
    #[inline]
    pub fn length() -> usize {
        KMER_LENGTH.load(Ordering::Relaxed)
    }

    /// Parse a k-mer from bytes. Case-insensitive. With a spaced seed
    /// active, positions the seed masks out may hold any character; they
    /// are stored as 'A' and never consulted by equality or hashing.
    pub fn from_bytes(seq: &[u8]) -> Result<Kmer, KmerError> {
        let k = Kmer::length();
        if seq.len() != k {
            return Err(KmerError::WrongLength);
        }
        let mask = SeedMask::active();
        let code_at = |i: usize, b: u8| match base_code(b) {
            Some(code) => Ok(code),
            None => match &mask {
                Some(m) if !m.cares(i) => Ok(0),
                _ => Err(KmerError::NotAcgt),
            },
        };
        if k <= 32 {
            let mut packed: u64 = 0;
            for (i, &b) in seq.iter().enumerate() {
                packed = (packed << 2) | u64::from(code_at(i, b)?);
            }
            Ok(Kmer { repr: Repr::Packed(packed) })
        } else {
            let mut codes = Vec::with_capacity(k);
            for (i, &b) in seq.iter().enumerate() {
                codes.push(code_at(i, b)?);
            }
            Ok(Kmer { repr: Repr::Heap(codes.into_boxed_slice()) })
        }
    }

    /// Parse a k-mer from a string slice.
    pub fn from_str(seq: &str) -> Result<Kmer, KmerError> {
        Kmer::from_bytes(seq.as_bytes())
    }

    /// The 2-bit code of the base at `pos`.
    #[inline]
    pub fn code_at(&self, pos: usize) -> u8 {
        let k = Kmer::length();
        debug_assert!(pos < k);
        match &self.repr {
            Repr::Packed(packed) => ((packed >> (2 * (k - 1 - pos))) & 3) as u8,
            Repr::Heap(codes) => codes[pos],
        }
    }

    fn set_code_at(&mut self, pos: usize, code: u8) {
        let k = Kmer::length();
        debug_assert!(pos < k);
        match &mut self.repr {
            Repr::Packed(packed) => {
                let shift = 2 * (k - 1 - pos);
                *packed = (*packed & !(3u64 << shift)) | (u64::from(code & 3) << shift);
            }
            Repr::Heap(codes) => codes[pos] = code & 3,
        }
    }

    /// The base character at `pos`.
    #[inline]
    pub fn base_at(&self, pos: usize) -> u8 {
        code_base(self.code_at(pos))
    }

    /// The reverse complement.
    pub fn reverse_complement(&self) -> Kmer {
        let k = Kmer::length();
        let mut out = self.clone();
        for i in 0..k {
            out.set_code_at(i, complement_code(self.code_at(k - 1 - i)));
        }
        out
    }

    /// Compare to another k-mer under the active mask: masked-out positions
    /// are skipped when a seed is configured.
    fn masked_cmp(&self, other: &Kmer) -> std::cmp::Ordering {
        let k = Kmer::length();
        let mask = SeedMask::active();
        for i in 0..k {
            if let Some(m) = &mask {
                if !m.cares(i) {
                    continue;
                }
            }
            match self.code_at(i).cmp(&other.code_at(i)) {
                std::cmp::Ordering::Equal => {}
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }

    /// Whether this k-mer is its own canonical form.
    pub fn is_canonical(&self) -> bool {
        self.masked_cmp(&self.reverse_complement()) != std::cmp::Ordering::Greater
    }

    /// The lexicographic minimum of this k-mer and its reverse complement,
    /// under the active mask. Idempotent.
    pub fn canonicalize(&self) -> Kmer {
        let rc = self.reverse_complement();
        if self.masked_cmp(&rc) == std::cmp::Ordering::Greater {
            rc
        } else {
            self.clone()
        }
    }

    /// Shift one base in on the `dir` end, dropping the base on the opposite
    /// end. `code` is the 2-bit code of the incoming base.
    pub fn shift(&self, dir: Dir, code: u8) -> Kmer {
        let k = Kmer::length();
        match (&self.repr, dir) {
            (Repr::Packed(packed), Dir::Sense) => {
                let mask = if k == 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
                Kmer { repr: Repr::Packed(((packed << 2) | u64::from(code & 3)) & mask) }
            }
            (Repr::Packed(packed), Dir::Antisense) => {
                let shifted = (packed >> 2) | (u64::from(code & 3) << (2 * (k - 1)));
                Kmer { repr: Repr::Packed(shifted) }
            }
            (Repr::Heap(codes), Dir::Sense) => {
                let mut out = Vec::with_capacity(k);
                out.extend_from_slice(&codes[1..]);
                out.push(code & 3);
                Kmer { repr: Repr::Heap(out.into_boxed_slice()) }
            }
            (Repr::Heap(codes), Dir::Antisense) => {
                let mut out = Vec::with_capacity(k);
                out.push(code & 3);
                out.extend_from_slice(&codes[..k - 1]);
                Kmer { repr: Repr::Heap(out.into_boxed_slice()) }
            }
        }
    }

    /// The 2-bit code of the base that leaves when shifting in direction
    /// `dir` (the first base for Sense, the last for Antisense).
    #[inline]
    pub fn outgoing_code(&self, dir: Dir) -> u8 {
        match dir {
            Dir::Sense => self.code_at(0),
            Dir::Antisense => self.code_at(Kmer::length() - 1),
        }
    }
}

impl PartialEq for Kmer {
    fn eq(&self, other: &Kmer) -> bool {
        if SeedMask::active().is_none() {
            return self.repr == other.repr;
        }
        self.masked_cmp(other) == std::cmp::Ordering::Equal
    }
}

impl std::hash::Hash for Kmer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match SeedMask::active() {
            None => match &self.repr {
                Repr::Packed(packed) => packed.hash(state),
                Repr::Heap(codes) => codes.hash(state),
            },
            // Only masked-in positions may contribute, so that k-mers equal
            // under the seed hash identically.
            Some(mask) => {
                let k = Kmer::length();
                for i in 0..k {
                    if mask.cares(i) {
                        self.code_at(i).hash(state);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kmer({})", self)
    }
}

impl fmt::Display for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = Kmer::length();
        for i in 0..k {
            write!(f, "{}", self.base_at(i) as char)?;
        }
        Ok(())
    }
}

/// Reverse complement of an arbitrary sequence string.
pub fn reverse_complement_str(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| match b {
            b'A' | b'a' => 'T',
            b'C' | b'c' => 'G',
            b'G' | b'g' => 'C',
            b'T' | b't' => 'A',
            other => other as char,
        })
        .collect()
}
