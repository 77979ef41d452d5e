// src/graph/trim.rs
//! Dead-end trimming.
//!
//! Removes short chains hanging off the graph: from every dead end, walk
//! inward; if the chain ends (at a branch, a merge point or another dead
//! end) within the trim length, delete it. Trim lengths double from 1 up
//! to the configured maximum so short tips are not starved by long ones.

use ahash::AHashSet;
use tracing::info;

use crate::graph::collection::SequenceCollection;
use crate::graph::walk::{linear_walk, WalkEnd};
use crate::kmer::{Dir, Kmer};

/// One trim pass at a fixed maximum chain length. Returns vertices removed.
fn trim_pass(g: &SequenceCollection, max_len: usize) -> usize {
    // Scan: find every dead end and the chain it dangles from.
    let chains: Vec<Vec<Kmer>> = g.par_filter_map(|kmer, _| {
        for dir in [Dir::Sense, Dir::Antisense] {
            // Dead on the `dir` side: walk away from it.
            if g.get_edges(kmer, dir).is_empty() {
                let (mut chain, end) = linear_walk(g, kmer, dir.flip(), max_len);
                let doomed = match end {
                    // Attached below a merge point, or an isolated island.
                    WalkEnd::Merge(_) | WalkEnd::DeadEnd => true,
                    // The walk entered the branching vertex itself; it
                    // belongs to the surviving continuations.
                    WalkEnd::Branch => {
                        chain.pop();
                        !chain.is_empty()
                    }
                    WalkEnd::TooLong | WalkEnd::Cycle => false,
                };
                if doomed {
                    return Some(chain);
                }
                return None;
            }
        }
        None
    });

    // Apply: delete each chain once, then sweep.
    let mut victims: AHashSet<Kmer> = AHashSet::new();
    for chain in chains {
        for kmer in chain {
            victims.insert(kmer.canonicalize());
        }
    }
    for kmer in &victims {
        g.remove(kmer);
    }
    g.cleanup()
}

/// Trim dead-end chains up to `trim_len` vertices, doubling the bound each
/// round and iterating the final bound to a fixed point. Returns the total
/// number of vertices removed.
pub fn perform_trim(g: &SequenceCollection, trim_len: usize) -> usize {
    if trim_len == 0 {
        return 0;
    }
    let mut total = 0;
    let mut len = 1;
    while len < trim_len {
        total += trim_pass(g, len);
        len *= 2;
    }
    loop {
        let removed = trim_pass(g, trim_len);
        total += removed;
        if removed == 0 {
            break;
        }
    }
    if total > 0 {
        info!("trimmed {} k-mers from dead-end chains", total);
    }
    total
}
