// src/graph/walk.rs
//! Linear chain walking over the de Bruijn graph.
//!
//! A walk follows single-edge extensions in one direction, in the caller's
//! orientation, and reports why it stopped. Trimming, bubble popping and
//! contig assembly all build on this.

use crate::graph::collection::SequenceCollection;
use crate::kmer::{Dir, Kmer};

/// Why a linear walk terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// No extension in the walk direction.
    DeadEnd,
    /// The current vertex has two or more extensions.
    Branch,
    /// The next vertex has two or more entries; it starts another chain.
    /// Carries that vertex in the walk's orientation.
    Merge(Kmer),
    /// The length bound was reached before any other stop condition.
    TooLong,
    /// The walk returned to its starting vertex.
    Cycle,
}

/// Follow single-edge extensions from `start` in direction `dir`, visiting
/// at most `max_len` vertices (including `start`).
///
/// Returns the visited chain, in walk order and the caller's orientation,
/// and the stop reason. The vertex that causes a Branch or Merge stop is
/// not part of the chain.
pub fn linear_walk(
    g: &SequenceCollection,
    start: &Kmer,
    dir: Dir,
    max_len: usize,
) -> (Vec<Kmer>, WalkEnd) {
    let mut chain = vec![start.clone()];
    let mut current = start.clone();
    loop {
        let edges = g.get_edges(&current, dir);
        match edges.degree() {
            0 => return (chain, WalkEnd::DeadEnd),
            1 => {}
            _ => return (chain, WalkEnd::Branch),
        }
        let code = edges.codes().next().unwrap();
        let next = current.shift(dir, code);
        if g.get_edges(&next, dir.flip()).degree() > 1 {
            return (chain, WalkEnd::Merge(next));
        }
        if next.canonicalize() == start.canonicalize() {
            return (chain, WalkEnd::Cycle);
        }
        if chain.len() >= max_len {
            return (chain, WalkEnd::TooLong);
        }
        chain.push(next.clone());
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::test_lock;

    fn build(seqs: &[&str]) -> SequenceCollection {
        let g = SequenceCollection::new();
        let k = Kmer::length();
        for seq in seqs {
            for i in 0..=seq.len() - k {
                g.insert(&Kmer::from_str(&seq[i..i + k]).unwrap());
            }
        }
        g.generate_adjacency();
        g
    }

    #[test]
    fn walk_to_dead_end() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = build(&["AATTACTGACC"]);
        let start = Kmer::from_str("AATTA").unwrap();
        let (chain, end) = linear_walk(&g, &start, Dir::Sense, 100);
        assert_eq!(end, WalkEnd::DeadEnd);
        assert_eq!(chain.len(), 7); // 11 - 5 + 1 windows
        assert_eq!(chain[0], start);
    }

    #[test]
    fn walk_stops_at_merge() {
        let _guard = test_lock();
        Kmer::set_length(5);
        // Two heads converging on one tail: the junction vertex has
        // in-degree 2.
        let g = build(&["AATTACTGACC", "CGTCACTGACC"]);
        let start = Kmer::from_str("AATTA").unwrap();
        let (chain, end) = linear_walk(&g, &start, Dir::Sense, 100);
        assert_eq!(end, WalkEnd::Merge(Kmer::from_str("ACTGA").unwrap()));
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn walk_respects_bound() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = build(&["AATTACTGACC"]);
        let start = Kmer::from_str("AATTA").unwrap();
        let (chain, end) = linear_walk(&g, &start, Dir::Sense, 3);
        assert_eq!(end, WalkEnd::TooLong);
        assert_eq!(chain.len(), 3);
    }
}
