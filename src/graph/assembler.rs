// src/graph/assembler.rs
//! Contig assembly over the cleaned de Bruijn graph.
//!
//! Ambiguous vertices (in- or out-degree >= 2) are marked and act as walk
//! boundaries. Every unambiguous vertex belongs to exactly one maximal
//! linear run; each run is emitted once as a contig, the antisense twin
//! being the same canonical record. Marked vertices are emitted alone.
//!
//! The same walk drives low-coverage removal: provisional contigs whose
//! mean multiplicity falls below the coverage threshold have all their
//! k-mers deleted.

use tracing::info;

use crate::graph::collection::{flags, SequenceCollection};
use crate::kmer::{Dir, Kmer};

/// An assembled contig.
#[derive(Debug, Clone)]
pub struct Contig {
    pub id: usize,
    pub sequence: String,
    /// Mean k-mer multiplicity over the contig's path.
    pub mean_coverage: f64,
    /// Number of path k-mers.
    pub kmers: usize,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Mark every vertex with two or more extensions on either strand.
/// Returns the number of marks set.
pub fn mark_ambiguous(g: &SequenceCollection) -> usize {
    let marks: Vec<(Kmer, u8)> = g.par_filter_map(|kmer, _| {
        let mut flag = 0u8;
        if g.get_edges(kmer, Dir::Sense).degree() >= 2 {
            flag |= flags::MARK_SENSE;
        }
        if g.get_edges(kmer, Dir::Antisense).degree() >= 2 {
            flag |= flags::MARK_ANTISENSE;
        }
        (flag != 0).then(|| (kmer.clone(), flag))
    });
    let n = marks.len();
    for (kmer, flag) in marks {
        g.set_flag(&kmer, flag);
    }
    n
}

/// One maximal unambiguous run: the canonical path vertices and the contig
/// sequence in walk orientation.
struct Run {
    path: Vec<Kmer>,
    sequence: String,
}

/// Extend from `seed` in `dir` through unmarked, unambiguous vertices.
/// Marked vertices are never entered: they belong to their own
/// single-vertex contig. The flag reports whether the walk came back
/// around to `seed` (a circular chain).
fn extend_run(g: &SequenceCollection, seed: &Kmer, dir: Dir) -> (Vec<Kmer>, bool) {
    let mut out = Vec::new();
    let mut current = seed.clone();
    loop {
        let Some(record) = g.get(&current) else { break };
        if record.marked(dir) {
            break; // ambiguous continuation
        }
        let edges = g.get_edges(&current, dir);
        if edges.degree() != 1 {
            break;
        }
        let next = current.shift(dir, edges.codes().next().unwrap());
        let Some(next_record) = g.get(&next) else { break };
        if next_record.flags & flags::MARK != 0 {
            break; // boundary vertex, emitted alone
        }
        if g.get_edges(&next, dir.flip()).degree() > 1 {
            break; // entry is ambiguous
        }
        if next.canonicalize() == seed.canonicalize() {
            return (out, true); // closed a cycle
        }
        out.push(next.clone());
        current = next;
    }
    (out, false)
}

fn run_from(g: &SequenceCollection, seed: &Kmer) -> Run {
    let record = g.get(seed).expect("seed must be live");
    if record.flags & flags::MARK != 0 {
        // Ambiguous vertices bound walks but are still emitted, alone.
        return Run { path: vec![seed.clone()], sequence: seed.to_string() };
    }

    // A circular chain is fully collected by the backward walk alone;
    // extending forward would visit every vertex twice.
    let (mut chain, cycled) = extend_run(g, seed, Dir::Antisense);
    chain.reverse();
    chain.push(seed.clone());
    if !cycled {
        chain.extend(extend_run(g, seed, Dir::Sense).0);
    }

    let mut sequence = chain[0].to_string();
    let k = Kmer::length();
    for kmer in &chain[1..] {
        sequence.push(kmer.base_at(k - 1) as char);
    }
    let path = chain.iter().map(|k| k.canonicalize()).collect();
    Run { path, sequence }
}

fn run_coverage(g: &SequenceCollection, path: &[Kmer]) -> f64 {
    let sum: u64 = path
        .iter()
        .filter_map(|k| g.get(k))
        .map(|r| u64::from(r.multiplicity))
        .sum();
    sum as f64 / path.len() as f64
}

/// Walk every run exactly once, driven by the SEEN flags.
fn for_each_run<F: FnMut(Run)>(g: &SequenceCollection, mut f: F) {
    let seeds: Vec<Kmer> = g.par_filter_map(|kmer, record| {
        (record.flags & flags::SEEN == 0).then(|| kmer.clone())
    });
    for seed in seeds {
        match g.get(&seed) {
            Some(record) if record.flags & flags::SEEN == 0 => {}
            _ => continue, // already emitted through its run, or deleted
        }
        let run = run_from(g, &seed);
        for kmer in &run.path {
            g.set_flag(kmer, flags::SEEN);
        }
        f(run);
    }
}

/// Remove every provisional contig whose mean multiplicity is below
/// `coverage`. Call with MARK flags set; the caller wipes them and
/// re-erodes afterwards. Returns (k-mers removed, contigs removed).
pub fn remove_low_coverage(g: &SequenceCollection, coverage: f64) -> (usize, usize) {
    let mut doomed_paths: Vec<Vec<Kmer>> = Vec::new();
    for_each_run(g, |run| {
        if run_coverage(g, &run.path) < coverage {
            doomed_paths.push(run.path);
        }
    });
    g.wipe_flag(flags::SEEN);

    let mut kmers = 0;
    for path in &doomed_paths {
        for kmer in path {
            g.remove(kmer);
            kmers += 1;
        }
    }
    g.cleanup();
    if !doomed_paths.is_empty() {
        info!(
            "removed {} low-coverage contigs ({} k-mers)",
            doomed_paths.len(),
            kmers
        );
    }
    (kmers, doomed_paths.len())
}

/// Final assembly: emit every run as a contig. Ids are assigned in
/// emission order. The graph is left with SEEN flags set.
pub fn assemble(g: &SequenceCollection) -> Vec<Contig> {
    let mut contigs = Vec::new();
    for_each_run(g, |run| {
        let mean_coverage = run_coverage(g, &run.path);
        contigs.push(Contig {
            id: contigs.len(),
            sequence: run.sequence,
            mean_coverage,
            kmers: run.path.len(),
        });
    });
    contigs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::test_lock;

    fn build(seqs: &[(&str, u16)]) -> SequenceCollection {
        let g = SequenceCollection::new();
        let k = Kmer::length();
        for &(seq, times) in seqs {
            for _ in 0..times {
                for i in 0..=seq.len() - k {
                    g.insert(&Kmer::from_str(&seq[i..i + k]).unwrap());
                }
            }
        }
        g.generate_adjacency();
        // Loading tracked observation strands in the SEEN bits; the walks
        // need them clear.
        g.wipe_flag(flags::SEEN);
        g
    }

    #[test]
    fn single_chain_yields_one_contig() {
        let _guard = test_lock();
        Kmer::set_length(5);
        let g = build(&[("AATTACTGACCGT", 3)]);
        mark_ambiguous(&g);
        let contigs = assemble(&g);
        assert_eq!(contigs.len(), 1);
        let c = &contigs[0];
        // Emitted in either strand orientation.
        assert!(
            c.sequence == "AATTACTGACCGT"
                || c.sequence == crate::kmer::kmer::reverse_complement_str("AATTACTGACCGT")
        );
        assert_eq!(c.kmers, 9);
        assert!((c.mean_coverage - 3.0).abs() < 1e-9);
    }

    #[test]
    fn assembly_partitions_unambiguous_vertices() {
        let _guard = test_lock();
        Kmer::set_length(5);
        // A fork: shared head, two tails.
        let g = build(&[("AATTACTGCAGGA", 2), ("AATTACTGAAGTC", 2)]);
        mark_ambiguous(&g);
        let contigs = assemble(&g);
        let total_kmers: usize = contigs.iter().map(|c| c.kmers).sum();
        assert_eq!(total_kmers, g.len());
        // Head run, branch vertex, two tail runs.
        assert_eq!(contigs.len(), 4);
    }

    #[test]
    fn low_coverage_run_is_excised() {
        let _guard = test_lock();
        Kmer::set_length(5);
        // A strong chain and a disconnected weak one.
        let g = build(&[("AATTACTGACCGT", 4), ("CCGGATTCGGTAC", 1)]);
        let before = g.len();
        mark_ambiguous(&g);
        let (kmers, contigs) = remove_low_coverage(&g, 2.0);
        g.wipe_flag(flags::MARK);
        assert_eq!(contigs, 1);
        assert_eq!(kmers, 9);
        assert_eq!(g.len(), before - 9);
        // The strong chain is intact.
        mark_ambiguous(&g);
        let contigs = assemble(&g);
        assert_eq!(contigs.len(), 1);
    }
}
