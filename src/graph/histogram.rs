// src/graph/histogram.rs
//! Coverage histogram over k-mer multiplicities.
//!
//! Built once after adjacency generation and used to pick the coverage
//! threshold: the first local minimum above the error peak, or the
//! user-supplied value when one is given.

use tracing::warn;

use crate::graph::collection::SequenceCollection;

/// Histogram of multiplicity -> number of vertices.
#[derive(Debug, Clone, Default)]
pub struct CoverageHistogram {
    counts: Vec<u64>,
}

impl CoverageHistogram {
    /// Tally every live vertex of the collection.
    pub fn build(g: &SequenceCollection) -> CoverageHistogram {
        let mut h = CoverageHistogram::default();
        g.for_each(|_, record| h.add(record.multiplicity));
        h
    }

    pub fn add(&mut self, multiplicity: u16) {
        let i = multiplicity as usize;
        if self.counts.len() <= i {
            self.counts.resize(i + 1, 0);
        }
        self.counts[i] += 1;
    }

    pub fn count(&self, multiplicity: usize) -> u64 {
        self.counts.get(multiplicity).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The first index i >= 2 with H[i] <= H[i-1] and H[i] < H[i+1]: the
    /// valley between the error peak and the coverage peak.
    pub fn first_local_minimum(&self) -> Option<u16> {
        for i in 2..self.counts.len().saturating_sub(1) {
            if self.counts[i] <= self.counts[i - 1] && self.counts[i] < self.counts[i + 1] {
                return Some(i as u16);
            }
        }
        None
    }
}

/// Derived coverage parameters for one assembly pass.
#[derive(Debug, Clone, Copy)]
pub struct CoverageParams {
    /// Mean-coverage threshold for contig removal. 0 disables the pass.
    pub coverage: f32,
    /// Tip-erosion multiplicity bound.
    pub erode: u16,
    /// Single-strand erosion bound.
    pub erode_strand: u16,
}

/// Resolve unset coverage options from the histogram's first local minimum.
/// With no local minimum the threshold stays 0 and the run proceeds, which
/// can leave error k-mers in the graph.
pub fn set_coverage_parameters(
    h: &CoverageHistogram,
    coverage: Option<f32>,
    erode: Option<u16>,
    erode_strand: Option<u16>,
) -> CoverageParams {
    let threshold = match h.first_local_minimum() {
        Some(t) => t,
        None => {
            warn!("coverage histogram has no local minimum; proceeding with threshold 0");
            0
        }
    };
    CoverageParams {
        coverage: coverage.unwrap_or(threshold as f32),
        erode: erode.unwrap_or(threshold),
        erode_strand: erode_strand.unwrap_or_else(|| threshold.min(1)),
    }
}

/// Mark DELETED every vertex with multiplicity < kc, then cleanup.
/// Returns the number removed.
pub fn apply_kmer_coverage_threshold(g: &SequenceCollection, kc: u16) -> usize {
    let victims = g.par_filter_map(|kmer, record| {
        (record.multiplicity < kc).then(|| kmer.clone())
    });
    for kmer in &victims {
        g.remove(kmer);
    }
    g.cleanup()
}
