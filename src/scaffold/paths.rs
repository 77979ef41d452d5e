// src/scaffold/paths.rs
//! Scaffold path assembly.
//!
//! After cleaning, the graph decomposes into unambiguous runs. Each run
//! becomes one scaffold: a sequence of oriented contigs separated by gap
//! pseudo-vertices sized from the distance estimates. A path and its
//! reverse complement are the same scaffold and are emitted once.

use ahash::AHashSet;
use petgraph::Direction;

use crate::scaffold::graph::{ContigNode, ScaffoldGraph};
use crate::stats::LengthHistogram;

/// One element of an output path: an oriented contig or an N-gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Contig(ContigNode),
    /// A run of N bases of the given length.
    Gap(u32),
}

/// Maximal unambiguous paths, singletons included. With `ss` set, contigs
/// are trusted to be oriented already and reverse-strand seeds are not
/// considered.
pub fn assemble_paths(sg: &ScaffoldGraph, ss: bool) -> Vec<Vec<ContigNode>> {
    let mut used: AHashSet<ContigNode> = AHashSet::new();
    let mut paths = Vec::new();

    let is_used = |used: &AHashSet<ContigNode>, v: ContigNode| {
        used.contains(&v) || (!ss && used.contains(&v.complement()))
    };

    for seed in sg.g.nodes() {
        if is_used(&used, seed) || (ss && seed.is_rc()) {
            continue;
        }

        let mut path = vec![seed];
        // Forward.
        loop {
            let last = *path.last().unwrap();
            let mut succs = sg.g.neighbors_directed(last, Direction::Outgoing);
            let Some(next) = succs.next() else { break };
            if succs.next().is_some() || sg.in_degree(next) != 1 {
                break;
            }
            if is_used(&used, next) || next == seed || path.contains(&next) {
                break;
            }
            path.push(next);
        }
        // Backward.
        loop {
            let first = path[0];
            let mut preds = sg.g.neighbors_directed(first, Direction::Incoming);
            let Some(prev) = preds.next() else { break };
            if preds.next().is_some() || sg.out_degree(prev) != 1 {
                break;
            }
            if is_used(&used, prev) || prev == *path.last().unwrap() || path.contains(&prev) {
                break;
            }
            path.insert(0, prev);
        }

        for &v in &path {
            used.insert(v);
            if !ss {
                used.insert(v.complement());
            }
        }
        paths.push(path);
    }
    paths
}

/// Interleave gap pseudo-vertices into a path. The gap between two contigs
/// is max(distance, min_gap) + k - 1, floored at 1; exact overlaps get no
/// gap. Distances come from the original graph when it still has the edge,
/// else from the cleaned graph (fork-resolution edges only exist there).
pub fn insert_gaps(
    g0: &ScaffoldGraph,
    g: &ScaffoldGraph,
    path: &[ContigNode],
    min_gap: i32,
    k: usize,
) -> Vec<PathStep> {
    let mut out = Vec::with_capacity(2 * path.len());
    let mut prev: Option<ContigNode> = None;
    for &v in path {
        if let Some(u) = prev {
            let est = g0
                .g
                .edge_weight(u, v)
                .or_else(|| g.g.edge_weight(u, v))
                .copied();
            if let Some(est) = est {
                if !est.is_overlap() {
                    let n = est.distance.max(min_gap) + k as i32 - 1;
                    out.push(PathStep::Gap(n.max(1) as u32));
                }
            }
        }
        out.push(PathStep::Contig(v));
        prev = Some(v);
    }
    out
}

/// Scaffold length, overlaps subtracted, gaps not counted.
pub fn path_length(sg: &ScaffoldGraph, path: &[ContigNode]) -> u64 {
    let mut length = i64::from(sg.length(path[0].id()));
    for pair in path.windows(2) {
        let (u, v) = (pair[0], pair[1]);
        if let Some(est) = sg.g.edge_weight(u, v) {
            length += i64::from(est.distance.min(0));
        }
        length += i64::from(sg.length(v.id()));
    }
    length.max(0) as u64
}

/// Render a path as space-separated tokens: oriented contig names and
/// `<len>N` gap runs.
pub fn format_steps(sg: &ScaffoldGraph, steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(|step| match step {
            PathStep::Contig(v) => sg.node_token(*v),
            PathStep::Gap(n) => format!("{}N", n),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Histogram over scaffold lengths plus the contigs left out of every
/// path. `sg` is the cleaned graph the paths were assembled from.
pub fn scaffold_length_histogram(
    sg: &ScaffoldGraph,
    paths: &[Vec<ContigNode>],
) -> LengthHistogram {
    let mut h = LengthHistogram::new();
    let mut in_path: AHashSet<u32> = AHashSet::new();
    for path in paths {
        h.insert(path_length(sg, path));
        for &v in path {
            in_path.insert(v.id());
        }
    }
    let mut counted: AHashSet<u32> = AHashSet::new();
    for v in sg.g.nodes() {
        if !in_path.contains(&v.id()) && counted.insert(v.id()) {
            h.insert(u64::from(sg.length(v.id())));
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::graph::DistanceEst;

    fn est(d: i32, n: u32) -> DistanceEst {
        DistanceEst { distance: d, std_dev: 1.0, num_pairs: n }
    }

    fn chain_graph() -> ScaffoldGraph {
        let mut sg = ScaffoldGraph::new();
        let a = sg.intern_node("a+").unwrap();
        let b = sg.intern_node("b+").unwrap();
        let c = sg.intern_node("c+").unwrap();
        sg.add_edge(a, b, est(100, 5));
        sg.add_edge(b, c, est(-20, 4));
        for id in 0..3 {
            sg.set_length(id, 1000);
        }
        sg.add_contig_nodes();
        sg.add_complementary_edges();
        sg
    }

    #[test]
    fn chain_becomes_one_path() {
        let sg = chain_graph();
        let paths = assemble_paths(&sg, false);
        // One three-contig scaffold; the complement strand is not emitted
        // separately.
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 3);
    }

    #[test]
    fn gaps_are_sized_from_estimates() {
        let sg = chain_graph();
        let paths = assemble_paths(&sg, false);
        let steps = insert_gaps(&sg, &sg, &paths[0], 50, 21);
        // a --gap(100 + 20)-- b --gap(50 + 20)-- c (second edge overlaps,
        // so min_gap applies), in one orientation or the other.
        let gaps: Vec<u32> = steps
            .iter()
            .filter_map(|s| match s {
                PathStep::Gap(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(gaps.len(), 2);
        assert!(gaps.contains(&120) && gaps.contains(&70));
    }

    #[test]
    fn path_length_subtracts_overlap() {
        let sg = chain_graph();
        let paths = assemble_paths(&sg, false);
        // 1000 + 1000 + 1000 - 20 overlap.
        assert_eq!(path_length(&sg, &paths[0]), 2980);
    }

    #[test]
    fn histogram_counts_stray_contigs() {
        let mut sg = chain_graph();
        let d = sg.intern("d");
        sg.set_length(d, 700);
        sg.add_contig_nodes();
        let paths = assemble_paths(&sg, false);
        let h = scaffold_length_histogram(&sg, &paths);
        // One scaffold plus the isolated contig d... which is also a
        // singleton path, so both appear via paths.
        assert_eq!(h.count(), 2);
        assert_eq!(h.sum(), 2980 + 700);
    }
}
