// src/graph/bubbles.rs
//! Bubble popping.
//!
//! A bubble is a set of internally-linear paths leaving the same branch
//! vertex and converging on the same sink, each within the bubble length
//! bound. Heterozygous sites and mid-read errors both produce them. The
//! branch with the highest mean multiplicity survives; k-mers unique to
//! the losing branches are deleted. Popped bubbles are recorded for audit.

use ahash::AHashMap;
use tracing::info;

use crate::graph::collection::SequenceCollection;
use crate::graph::walk::{linear_walk, WalkEnd};
use crate::kmer::{Dir, Kmer};

/// Audit record of one popped bubble: the branch sequences, sorted, the
/// kept one included.
#[derive(Debug, Clone)]
pub struct Bubble {
    pub branches: Vec<String>,
}

struct BranchPath {
    chain: Vec<Kmer>,
    mean: f64,
}

impl BranchPath {
    fn sequence(&self) -> String {
        let mut seq = self.chain[0].to_string();
        for kmer in &self.chain[1..] {
            seq.push(kmer.base_at(Kmer::length() - 1) as char);
        }
        seq
    }
}

fn mean_multiplicity(g: &SequenceCollection, chain: &[Kmer]) -> f64 {
    let sum: u64 = chain
        .iter()
        .filter_map(|k| g.get(k))
        .map(|r| u64::from(r.multiplicity))
        .sum();
    sum as f64 / chain.len() as f64
}

/// Pop every bubble of branch length <= `bubble_len`. Returns the number of
/// bubbles popped and their audit records.
pub fn pop_bubbles(g: &SequenceCollection, bubble_len: usize) -> (usize, Vec<Bubble>) {
    // Scan: branch vertices, viewed on the strand where they fan out.
    let seeds: Vec<Kmer> = g.par_filter_map(|kmer, _| {
        if g.get_edges(kmer, Dir::Sense).degree() >= 2 {
            Some(kmer.clone())
        } else if g.get_edges(kmer, Dir::Antisense).degree() >= 2 {
            Some(kmer.reverse_complement())
        } else {
            None
        }
    });

    let mut popped = 0;
    let mut records = Vec::new();

    // Apply serially: each pop changes degrees the next seed must observe.
    for u in seeds {
        let edges = g.get_edges(&u, Dir::Sense);
        if edges.degree() < 2 {
            continue; // changed by an earlier pop
        }

        // Walk each branch until it merges into a sink.
        let mut by_sink: AHashMap<Kmer, Vec<BranchPath>> = AHashMap::new();
        for code in edges.codes() {
            let start = u.shift(Dir::Sense, code);
            if g.get_edges(&start, Dir::Antisense).degree() != 1 {
                continue; // first vertex is not internal to a simple branch
            }
            let (chain, end) = linear_walk(g, &start, Dir::Sense, bubble_len);
            if let WalkEnd::Merge(sink) = end {
                let mean = mean_multiplicity(g, &chain);
                by_sink
                    .entry(sink.canonicalize())
                    .or_default()
                    .push(BranchPath { chain, mean });
            }
        }

        for (_, mut paths) in by_sink {
            if paths.len() < 2 {
                continue;
            }
            // Highest mean multiplicity wins; ties go to the
            // lexicographically smallest canonical sequence.
            paths.sort_by(|a, b| {
                b.mean
                    .partial_cmp(&a.mean)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.sequence().cmp(&b.sequence()))
            });
            let keeper = &paths[0];
            let keeper_len = keeper.chain.len();
            let kept: Vec<Kmer> = keeper.chain.iter().map(|k| k.canonicalize()).collect();

            let mut branches = vec![keeper.sequence()];
            let mut removed_any = false;
            for loser in &paths[1..] {
                // Branches of very different lengths are not alternates of
                // the same locus.
                if loser.chain.len().abs_diff(keeper_len) > bubble_len / 2 {
                    continue;
                }
                branches.push(loser.sequence());
                for kmer in &loser.chain {
                    let canon = kmer.canonicalize();
                    if !kept.contains(&canon) {
                        g.remove(&canon);
                        removed_any = true;
                    }
                }
            }
            if removed_any {
                popped += 1;
                branches.sort();
                records.push(Bubble { branches });
                g.cleanup();
            }
        }
    }

    if popped > 0 {
        info!("popped {} bubbles", popped);
    }
    (popped, records)
}
