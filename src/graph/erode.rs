// src/graph/erode.rs
//! Tip erosion.
//!
//! Sequencing errors concentrate at read ends and produce low-multiplicity
//! k-mers dangling off the graph. A k-mer at the end of its chain (no
//! extension on at least one strand) is eroded when its multiplicity falls
//! below the erosion bound, or below the single-strand bound when it was
//! observed in only one orientation. The pass repeats until it removes
//! nothing.

use tracing::info;

use crate::graph::collection::{flags, SequenceCollection};
use crate::graph::histogram::CoverageParams;
use crate::kmer::Dir;

/// One scan/apply/cleanup erosion round. Returns the number of vertices
/// removed.
fn erode_pass(g: &SequenceCollection, params: &CoverageParams) -> usize {
    let victims = g.par_filter_map(|kmer, record| {
        let out = g.get_edges(kmer, Dir::Sense);
        let into = g.get_edges(kmer, Dir::Antisense);
        if !out.is_empty() && !into.is_empty() {
            return None; // interior vertex
        }
        let single_strand = {
            let seen = record.flags & flags::SEEN;
            seen == flags::SENSE_SEEN || seen == flags::ANTISENSE_SEEN
        };
        let doomed = record.multiplicity < params.erode
            || (single_strand && record.multiplicity < params.erode_strand);
        doomed.then(|| kmer.clone())
    });

    for kmer in &victims {
        g.remove(kmer);
    }
    g.cleanup()
}

/// Erode tips to a fixed point. Returns the total number of vertices
/// removed. The strand-observation SEEN flags are wiped afterwards so the
/// assembly walks start clean.
pub fn erode_ends(g: &SequenceCollection, params: &CoverageParams) -> usize {
    let mut total = 0;
    loop {
        let removed = erode_pass(g, params);
        if removed == 0 {
            break;
        }
        total += removed;
    }
    g.wipe_flag(flags::SEEN);
    if total > 0 {
        info!("eroded {} tip k-mers", total);
    }
    total
}
