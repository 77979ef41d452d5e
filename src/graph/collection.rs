// src/graph/collection.rs
//! Hashed de Bruijn graph store.
//!
//! Maps each canonical k-mer to a vertex record: a saturating multiplicity
//! counter, one 4-bit edge mask per strand, and a flag byte. The store is
//! split into hash-sharded stripes so concurrent inserts and flag updates
//! do not contend on a single lock.
//!
//! Edge masks are advisory: a set bit whose target k-mer is absent is
//! treated as no edge. `cleanup` re-establishes exact consistency after a
//! deletion pass by AND-masking every mask against membership.

use std::hash::BuildHasher;
use std::sync::Mutex;

use ahash::{AHashMap, RandomState};
use rayon::prelude::*;

use crate::kmer::{Dir, Kmer};

/// Per-vertex flag bits.
pub mod flags {
    /// Tombstone; the entry is removed by the next `cleanup`.
    pub const DELETED: u8 = 0x01;
    /// Emitted while walking in the sense direction.
    pub const SENSE_SEEN: u8 = 0x02;
    /// Emitted while walking in the antisense direction.
    pub const ANTISENSE_SEEN: u8 = 0x04;
    /// Ambiguous on the sense strand (walk boundary).
    pub const MARK_SENSE: u8 = 0x08;
    /// Ambiguous on the antisense strand.
    pub const MARK_ANTISENSE: u8 = 0x10;

    pub const SEEN: u8 = SENSE_SEEN | ANTISENSE_SEEN;
    pub const MARK: u8 = MARK_SENSE | MARK_ANTISENSE;
}

/// Swap the strand-paired flag bits. Applied when a record is accessed
/// through its non-canonical orientation.
#[inline]
fn complement_flags(flag: u8) -> u8 {
    let mut out = flag & !(flags::SEEN | flags::MARK);
    if flag & flags::SENSE_SEEN != 0 {
        out |= flags::ANTISENSE_SEEN;
    }
    if flag & flags::ANTISENSE_SEEN != 0 {
        out |= flags::SENSE_SEEN;
    }
    if flag & flags::MARK_SENSE != 0 {
        out |= flags::MARK_ANTISENSE;
    }
    if flag & flags::MARK_ANTISENSE != 0 {
        out |= flags::MARK_SENSE;
    }
    out
}

/// A 4-bit edge mask, one bit per base code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeSet(u8);

impl EdgeSet {
    #[inline]
    pub fn set(&mut self, code: u8) {
        self.0 |= 1 << (code & 3);
    }

    #[inline]
    pub fn clear(&mut self, code: u8) {
        self.0 &= !(1 << (code & 3));
    }

    #[inline]
    pub fn has(&self, code: u8) -> bool {
        self.0 & (1 << (code & 3)) != 0
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Base codes with a set bit.
    pub fn codes(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..4).filter(move |&c| self.has(c))
    }

    /// The mask seen from the opposite strand: each base maps to its
    /// complement.
    #[inline]
    pub fn complement(&self) -> EdgeSet {
        let mut out = EdgeSet::default();
        for c in self.codes() {
            out.set(3 - c);
        }
        out
    }
}

/// Record stored per canonical k-mer.
#[derive(Debug, Clone, Default)]
pub struct VertexRecord {
    /// Saturating occurrence count.
    pub multiplicity: u16,
    /// Edge masks indexed by `Dir`.
    ext: [EdgeSet; 2],
    /// Flag byte; see [`flags`].
    pub flags: u8,
}

impl VertexRecord {
    #[inline]
    pub fn edges(&self, dir: Dir) -> EdgeSet {
        self.ext[dir.index()]
    }

    #[inline]
    pub fn set_edge(&mut self, dir: Dir, code: u8) {
        self.ext[dir.index()].set(code);
    }

    #[inline]
    pub fn deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    #[inline]
    pub fn marked(&self, dir: Dir) -> bool {
        let bit = match dir {
            Dir::Sense => flags::MARK_SENSE,
            Dir::Antisense => flags::MARK_ANTISENSE,
        };
        self.flags & bit != 0
    }

    /// The record as seen from the opposite strand: edge masks swapped and
    /// complemented, strand-paired flags swapped.
    pub fn complemented(&self) -> VertexRecord {
        VertexRecord {
            multiplicity: self.multiplicity,
            ext: [self.ext[1].complement(), self.ext[0].complement()],
            flags: complement_flags(self.flags),
        }
    }
}

const SHARD_BITS: usize = 6;
const SHARDS: usize = 1 << SHARD_BITS;

/// The sharded canonical-k-mer store.
pub struct SequenceCollection {
    shards: Box<[Mutex<AHashMap<Kmer, VertexRecord>>]>,
    hasher: RandomState,
}

impl Default for SequenceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCollection {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Reserve for an expected number of unique k-mers.
    pub fn with_capacity(expected: usize) -> Self {
        let per_shard = expected / SHARDS;
        let shards = (0..SHARDS)
            .map(|_| Mutex::new(AHashMap::with_capacity(per_shard)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        SequenceCollection {
            shards,
            // Fixed seeds: shard choice must not vary between runs.
            hasher: RandomState::with_seeds(
                0x243f6a8885a308d3,
                0x13198a2e03707344,
                0xa4093822299f31d0,
                0x082efa98ec4e6c89,
            ),
        }
    }

    #[inline]
    fn shard_of(&self, kmer: &Kmer) -> usize {
        (self.hasher.hash_one(kmer) as usize) & (SHARDS - 1)
    }

    /// Number of stored vertices, including DELETED tombstones.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().unwrap().is_empty())
    }

    /// Insert one observation of `kmer`. Canonicalizes, then either
    /// saturating-increments the existing record or allocates a new one.
    /// Returns whether the k-mer was already present.
    ///
    /// The strand of the observation is recorded in the SEEN flags (sense
    /// when the observed orientation is the canonical one); erosion reads
    /// them to find single-stranded tips and wipes them when it finishes.
    pub fn insert(&self, kmer: &Kmer) -> bool {
        let strand = if kmer.is_canonical() { flags::SENSE_SEEN } else { flags::ANTISENSE_SEEN };
        let canon = kmer.canonicalize();
        let shard = self.shard_of(&canon);
        let mut map = self.shards[shard].lock().unwrap();
        match map.get_mut(&canon) {
            Some(record) => {
                record.multiplicity = record.multiplicity.saturating_add(1);
                record.flags |= strand;
                true
            }
            None => {
                map.insert(
                    canon,
                    VertexRecord { multiplicity: 1, flags: strand, ..Default::default() },
                );
                false
            }
        }
    }

    /// Whether a live (non-DELETED) record exists for `kmer`.
    pub fn contains(&self, kmer: &Kmer) -> bool {
        let canon = kmer.canonicalize();
        let map = self.shards[self.shard_of(&canon)].lock().unwrap();
        map.get(&canon).map_or(false, |r| !r.deleted())
    }

    /// A copy of the record for `kmer`, oriented to the caller's strand:
    /// if `kmer` is not the stored canonical form, masks and strand flags
    /// come back complemented.
    pub fn get(&self, kmer: &Kmer) -> Option<VertexRecord> {
        let canon = kmer.canonicalize();
        let map = self.shards[self.shard_of(&canon)].lock().unwrap();
        let record = map.get(&canon)?;
        if record.deleted() {
            return None;
        }
        if kmer.is_canonical() {
            Some(record.clone())
        } else {
            Some(record.complemented())
        }
    }

    /// Mark `kmer` DELETED. The entry stays until the next `cleanup`.
    pub fn remove(&self, kmer: &Kmer) {
        self.update(kmer, |r| r.flags |= flags::DELETED);
    }

    /// Set a flag on `kmer`, reorienting strand-paired flags when the
    /// caller's orientation is non-canonical.
    pub fn set_flag(&self, kmer: &Kmer, flag: u8) {
        let oriented = if kmer.is_canonical() { flag } else { complement_flags(flag) };
        self.update(kmer, |r| r.flags |= oriented);
    }

    pub fn clear_flag(&self, kmer: &Kmer, flag: u8) {
        let oriented = if kmer.is_canonical() { flag } else { complement_flags(flag) };
        self.update(kmer, |r| r.flags &= !oriented);
    }

    fn update<F: FnOnce(&mut VertexRecord)>(&self, kmer: &Kmer, f: F) {
        let canon = kmer.canonicalize();
        let mut map = self.shards[self.shard_of(&canon)].lock().unwrap();
        if let Some(record) = map.get_mut(&canon) {
            f(record);
        }
    }

    /// Clear `flag` on every record.
    pub fn wipe_flag(&self, flag: u8) {
        for shard in self.shards.iter() {
            let mut map = shard.lock().unwrap();
            for record in map.values_mut() {
                record.flags &= !flag;
            }
        }
    }

    /// The live edges of `kmer` in direction `dir` (caller's orientation):
    /// the stored mask AND-ed with membership of each candidate neighbor.
    pub fn get_edges(&self, kmer: &Kmer, dir: Dir) -> EdgeSet {
        let Some(record) = self.get(kmer) else {
            return EdgeSet::default();
        };
        let mut live = EdgeSet::default();
        for code in record.edges(dir).codes() {
            if self.contains(&kmer.shift(dir, code)) {
                live.set(code);
            }
        }
        live
    }

    /// Probe all eight single-base extensions of every vertex and set the
    /// corresponding edge bits. Masks become symmetric: both endpoints of
    /// every edge observe it.
    pub fn generate_adjacency(&self) {
        // Read-only probe phase, parallel over shards.
        let updates: Vec<(usize, Vec<(Kmer, [EdgeSet; 2])>)> = (0..SHARDS)
            .into_par_iter()
            .map(|i| {
                let mut shard_updates = Vec::new();
                let keys: Vec<Kmer> = {
                    let map = self.shards[i].lock().unwrap();
                    map.iter()
                        .filter(|(_, r)| !r.deleted())
                        .map(|(k, _)| k.clone())
                        .collect()
                };
                for kmer in keys {
                    let mut ext = [EdgeSet::default(); 2];
                    for dir in [Dir::Sense, Dir::Antisense] {
                        for code in 0u8..4 {
                            if self.contains(&kmer.shift(dir, code)) {
                                ext[dir.index()].set(code);
                            }
                        }
                    }
                    shard_updates.push((kmer, ext));
                }
                (i, shard_updates)
            })
            .collect();

        for (i, shard_updates) in updates {
            let mut map = self.shards[i].lock().unwrap();
            for (kmer, ext) in shard_updates {
                if let Some(record) = map.get_mut(&kmer) {
                    record.ext = ext;
                }
            }
        }
    }

    /// Physically remove DELETED entries, then drop every edge bit whose
    /// target is no longer present. Idempotent.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut map = shard.lock().unwrap();
            let before = map.len();
            map.retain(|_, r| !r.deleted());
            removed += before - map.len();
        }

        // Membership settled; AND-mask the surviving records.
        let updates: Vec<(usize, Vec<(Kmer, [EdgeSet; 2])>)> = (0..SHARDS)
            .into_par_iter()
            .map(|i| {
                let entries: Vec<(Kmer, [EdgeSet; 2])> = {
                    let map = self.shards[i].lock().unwrap();
                    map.iter()
                        .map(|(k, r)| (k.clone(), [r.edges(Dir::Sense), r.edges(Dir::Antisense)]))
                        .collect()
                };
                let mut shard_updates = Vec::new();
                for (kmer, ext) in entries {
                    let mut live = [EdgeSet::default(); 2];
                    let mut changed = false;
                    for dir in [Dir::Sense, Dir::Antisense] {
                        for code in ext[dir.index()].codes() {
                            if self.contains(&kmer.shift(dir, code)) {
                                live[dir.index()].set(code);
                            } else {
                                changed = true;
                            }
                        }
                    }
                    if changed {
                        shard_updates.push((kmer, live));
                    }
                }
                (i, shard_updates)
            })
            .collect();

        for (i, shard_updates) in updates {
            let mut map = self.shards[i].lock().unwrap();
            for (kmer, ext) in shard_updates {
                if let Some(record) = map.get_mut(&kmer) {
                    record.ext = ext;
                }
            }
        }
        removed
    }

    /// Visit every live record single-threaded. Each shard is snapshotted
    /// before the callback runs, so the callback may query the collection
    /// without re-entering a held lock.
    pub fn for_each<F: FnMut(&Kmer, &VertexRecord)>(&self, mut f: F) {
        for shard in self.shards.iter() {
            let entries: Vec<(Kmer, VertexRecord)> = {
                let map = shard.lock().unwrap();
                map.iter()
                    .filter(|(_, r)| !r.deleted())
                    .map(|(k, r)| (k.clone(), r.clone()))
                    .collect()
            };
            for (kmer, record) in &entries {
                f(kmer, record);
            }
        }
    }

    /// Parallel read-only scan over live records, collecting the non-None
    /// results. This is the scan half of every scan/apply/cleanup pass.
    /// The callback runs against a snapshot, outside the shard locks.
    pub fn par_filter_map<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&Kmer, &VertexRecord) -> Option<T> + Sync,
    {
        (0..SHARDS)
            .into_par_iter()
            .flat_map_iter(|i| {
                let entries: Vec<(Kmer, VertexRecord)> = {
                    let map = self.shards[i].lock().unwrap();
                    map.iter()
                        .filter(|(_, r)| !r.deleted())
                        .map(|(k, r)| (k.clone(), r.clone()))
                        .collect()
                };
                entries
                    .into_iter()
                    .filter_map(|(k, r)| f(&k, &r))
                    .collect::<Vec<T>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::test_lock;

    fn insert_seq(g: &SequenceCollection, seq: &str) {
        let k = Kmer::length();
        for i in 0..=seq.len() - k {
            g.insert(&Kmer::from_str(&seq[i..i + k]).unwrap());
        }
    }

    #[test]
    fn insert_canonicalizes_and_counts() {
        let _guard = test_lock();
        Kmer::set_length(3);
        let g = SequenceCollection::new();
        // GTA and its reverse complement TAC are one vertex.
        assert!(!g.insert(&Kmer::from_str("GTA").unwrap()));
        assert!(g.insert(&Kmer::from_str("TAC").unwrap()));
        assert_eq!(g.len(), 1);
        let record = g.get(&Kmer::from_str("GTA").unwrap()).unwrap();
        assert_eq!(record.multiplicity, 2);
    }

    #[test]
    fn single_read_yields_four_canonical_trimers() {
        let _guard = test_lock();
        Kmer::set_length(3);
        let g = SequenceCollection::new();
        insert_seq(&g, "ACGTACGT");
        // Windows {ACG, CGT, GTA, TAC}; CGT canonicalizes to ACG and TAC
        // to GTA.
        let mut seen: Vec<String> = Vec::new();
        g.for_each(|k, _| seen.push(k.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["ACG", "GTA"]);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = SequenceCollection::new();
        insert_seq(&g, "ACGTACG");
        g.generate_adjacency();
        // For every out-edge u->v the neighbor sees the matching in-edge.
        let mut checked = 0;
        let entries: Vec<Kmer> = {
            let mut v = Vec::new();
            g.for_each(|k, _| v.push(k.clone()));
            v
        };
        for u in entries {
            let record = g.get(&u).unwrap();
            for code in record.edges(Dir::Sense).codes() {
                let v = u.shift(Dir::Sense, code);
                let back = g.get(&v).unwrap();
                assert!(back.edges(Dir::Antisense).has(u.outgoing_code(Dir::Sense)));
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn cleanup_removes_deleted_and_prunes_edges() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = SequenceCollection::new();
        insert_seq(&g, "ACGTACG");
        g.generate_adjacency();
        let victim = Kmer::from_str("CGTAC").unwrap();
        g.remove(&victim);
        let removed = g.cleanup();
        assert_eq!(removed, 1);
        assert!(!g.contains(&victim));
        // No surviving record may point at the victim.
        g.for_each(|k, r| {
            for dir in [Dir::Sense, Dir::Antisense] {
                for code in r.edges(dir).codes() {
                    assert!(g.contains(&k.shift(dir, code)));
                }
            }
        });
        // Second cleanup with no intervening mutation is a no-op.
        assert_eq!(g.cleanup(), 0);
    }

    #[test]
    fn get_edges_masks_absent_neighbors() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = SequenceCollection::new();
        insert_seq(&g, "ACGTACG");
        g.generate_adjacency();
        // Delete a neighbor without cleanup: the advisory bit must not
        // surface through get_edges.
        let u = Kmer::from_str("ACGTA").unwrap();
        let v = u.shift(Dir::Sense, crate::kmer::kmer::base_code(b'C').unwrap());
        g.remove(&v);
        assert!(!g.get_edges(&u, Dir::Sense).has(1));
    }

    #[test]
    fn strand_flags_reorient() {
        let _guard = test_lock();
        Kmer::set_length(3);
        let g = SequenceCollection::new();
        let fwd = Kmer::from_str("TAC").unwrap(); // canonical form is GTA
        g.insert(&fwd);
        g.set_flag(&fwd, flags::SENSE_SEEN);
        // Through the canonical orientation the flag reads as antisense.
        let canon = fwd.canonicalize();
        let record = g.get(&canon).unwrap();
        assert!(record.flags & flags::ANTISENSE_SEEN != 0);
        // Through the original orientation it reads back as sense.
        let record = g.get(&fwd).unwrap();
        assert!(record.flags & flags::SENSE_SEEN != 0);
    }
}
