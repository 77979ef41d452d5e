// src/scaffold/cleanup.rs
//! Scaffold graph cleaning passes.
//!
//! Each pass keeps the reverse-complement symmetry of the graph: whenever
//! an edge or vertex goes, so does its twin. The passes run in a fixed
//! order per parameter point; see `scaffold::search`.

use ahash::AHashSet;
use petgraph::Direction;
use tracing::debug;

use crate::scaffold::graph::{ContigNode, ScaffoldGraph};

/// Longest bubble branch considered by `pop_bubbles`.
const MAX_BUBBLE_BRANCH: usize = 6;

/// Remove vertices shorter than `min_len` (their edges first, the vertex
/// once isolated) and edges supported by fewer than `min_pairs` pairs.
pub fn filter_graph(sg: &mut ScaffoldGraph, min_pairs: u32, min_len: u32) -> (usize, usize) {
    // Clear the edges of short contigs.
    let nodes: Vec<ContigNode> = sg.g.nodes().collect();
    for &u in &nodes {
        if sg.length(u.id()) < min_len {
            let incident: Vec<(ContigNode, ContigNode)> = sg
                .g
                .neighbors_directed(u, Direction::Outgoing)
                .map(|v| (u, v))
                .chain(sg.g.neighbors_directed(u, Direction::Incoming).map(|p| (p, u)))
                .collect();
            for (a, b) in incident {
                sg.g.remove_edge(a, b);
            }
        }
    }
    // Drop whatever ended up isolated.
    let mut removed_v = 0;
    for u in nodes {
        if sg.g.contains_node(u) && sg.out_degree(u) == 0 && sg.in_degree(u) == 0 {
            sg.g.remove_node(u);
            removed_v += 1;
        }
    }

    // Drop poorly-supported edges.
    let weak: Vec<(ContigNode, ContigNode)> = sg
        .g
        .all_edges()
        .filter(|&(_, _, est)| est.num_pairs < min_pairs)
        .map(|(u, v, _)| (u, v))
        .collect();
    let removed_e = weak.len();
    for (u, v) in weak {
        sg.g.remove_edge(u, v);
    }
    debug!("filter: removed {} vertices, {} edges", removed_v, removed_e);
    (removed_v, removed_e)
}

/// Remove both edges of every two-cycle u->v, v->u.
pub fn remove_cycles(sg: &mut ScaffoldGraph) -> usize {
    let cyclic: Vec<(ContigNode, ContigNode)> = sg
        .g
        .all_edges()
        .filter(|&(u, v, _)| sg.g.contains_edge(v, u))
        .map(|(u, v, _)| (u, v))
        .collect();
    for &(u, v) in &cyclic {
        sg.g.remove_edge(u, v);
    }
    debug!("removed {} cyclic edges", cyclic.len());
    cyclic.len()
}

/// For a fork u->{v1,v2} with no edge between v1 and v2, copy the one
/// ordering edge that exists in the original graph. Returns edges added.
pub fn resolve_forks(sg: &mut ScaffoldGraph, g0: &ScaffoldGraph) -> usize {
    let mut added = 0;
    let nodes: Vec<ContigNode> = sg.g.nodes().collect();
    for u in nodes {
        let succs: Vec<ContigNode> = sg.g.neighbors_directed(u, Direction::Outgoing).collect();
        if succs.len() < 2 {
            continue;
        }
        for i in 0..succs.len() {
            for j in i + 1..succs.len() {
                let (v1, v2) = (succs[i], succs[j]);
                if sg.g.contains_edge(v1, v2) || sg.g.contains_edge(v2, v1) {
                    continue;
                }
                let e12 = g0.g.edge_weight(v1, v2).copied();
                let e21 = g0.g.edge_weight(v2, v1).copied();
                match (e12, e21) {
                    (Some(_), Some(_)) => {
                        debug!("fork at {}: v1/v2 cycle in original graph", sg.node_token(u));
                    }
                    (Some(est), None) => {
                        sg.g.add_edge(v1, v2, est);
                        sg.g.add_edge(v2.complement(), v1.complement(), est);
                        added += 1;
                    }
                    (None, Some(est)) => {
                        sg.g.add_edge(v2, v1, est);
                        sg.g.add_edge(v1.complement(), v2.complement(), est);
                        added += 1;
                    }
                    (None, None) => {}
                }
            }
        }
    }
    debug!("added {} fork-resolving edges", added);
    added
}

/// Remove tips: a vertex with a single predecessor, no successors, whose
/// predecessor branches. The mirrored pattern covers the complement.
pub fn prune_tips(sg: &mut ScaffoldGraph) -> usize {
    let tips: Vec<ContigNode> = sg
        .g
        .nodes()
        .filter(|&v| {
            let fwd_tip = sg.out_degree(v) == 0
                && sg.in_degree(v) == 1
                && sg
                    .g
                    .neighbors_directed(v, Direction::Incoming)
                    .next()
                    .map_or(false, |u| sg.out_degree(u) > 1);
            let rev_tip = sg.in_degree(v) == 0
                && sg.out_degree(v) == 1
                && sg
                    .g
                    .neighbors_directed(v, Direction::Outgoing)
                    .next()
                    .map_or(false, |w| sg.in_degree(w) > 1);
            fwd_tip || rev_tip
        })
        .collect();

    let mut removed: AHashSet<u32> = AHashSet::new();
    for v in tips {
        if removed.insert(v.id()) {
            sg.remove_vertex_pair(v);
        }
    }
    debug!("pruned {} tips", removed.len());
    removed.len()
}

fn clear_out_edges_symmetric(sg: &mut ScaffoldGraph, u: ContigNode) {
    let succs: Vec<ContigNode> = sg.g.neighbors_directed(u, Direction::Outgoing).collect();
    for v in succs {
        sg.g.remove_edge(u, v);
        sg.g.remove_edge(v.complement(), u.complement());
    }
}

/// Transitive edges u->w spanning some u->v->w.
fn find_transitive_edges(sg: &ScaffoldGraph) -> Vec<(ContigNode, ContigNode)> {
    let mut out = Vec::new();
    for (u, w, _) in sg.g.all_edges() {
        let via = sg
            .g
            .neighbors_directed(u, Direction::Outgoing)
            .any(|v| v != w && sg.g.contains_edge(v, w));
        if via {
            out.push((u, w));
        }
    }
    out
}

/// Remove repeat vertices: v lies on a transitively-spanned path u->v->w1
/// but also leads somewhere unrelated to w1. Its outgoing edges are
/// cleared; the vertex itself goes once both orientations are implicated.
pub fn remove_repeats(sg: &mut ScaffoldGraph) -> usize {
    let mut repeats: Vec<ContigNode> = Vec::new();
    for (u, w1) in find_transitive_edges(sg) {
        let vias: Vec<ContigNode> = sg
            .g
            .neighbors_directed(u, Direction::Outgoing)
            .filter(|&v| v != w1 && sg.g.contains_edge(v, w1))
            .collect();
        for v in vias {
            let unrelated = sg.g.neighbors_directed(v, Direction::Outgoing).any(|w2| {
                w2 != w1 && !sg.g.contains_edge(w1, w2) && !sg.g.contains_edge(w2, w1)
            });
            if unrelated {
                repeats.push(v);
            }
        }
    }

    repeats.sort();
    repeats.dedup();
    let mut removed = 0;
    for i in 0..repeats.len() {
        let v = repeats[i];
        clear_out_edges_symmetric(sg, v);
        if i > 0 && repeats[i - 1] == v.complement() {
            sg.remove_vertex_pair(v);
            removed += 1;
        }
    }
    debug!("cleared {} repeat vertices, removed {}", repeats.len(), removed);
    removed
}

/// Is there an indirect u->..->w path of at most `max_edges` edges?
fn has_shortcut_path(sg: &ScaffoldGraph, u: ContigNode, w: ContigNode, max_edges: usize) -> bool {
    // Depth-bounded DFS avoiding the direct edge.
    let mut stack: Vec<(ContigNode, usize)> = sg
        .g
        .neighbors_directed(u, Direction::Outgoing)
        .filter(|&v| v != w)
        .map(|v| (v, 1))
        .collect();
    while let Some((v, depth)) = stack.pop() {
        if depth >= max_edges {
            continue;
        }
        for x in sg.g.neighbors_directed(v, Direction::Outgoing) {
            if x == w {
                return true;
            }
            stack.push((x, depth + 1));
        }
    }
    false
}

/// Remove transitive edges. The complex variant also drops edges that
/// shortcut three-edge paths. Returns edges removed.
pub fn remove_transitive_edges(sg: &mut ScaffoldGraph, complex: bool) -> usize {
    let max_edges = if complex { 3 } else { 2 };
    let doomed: Vec<(ContigNode, ContigNode)> = sg
        .g
        .all_edges()
        .map(|(u, w, _)| (u, w))
        .collect::<Vec<_>>()
        .into_iter()
        .filter(|&(u, w)| has_shortcut_path(sg, u, w, max_edges))
        .collect();
    for &(u, w) in &doomed {
        sg.g.remove_edge(u, w);
        sg.g.remove_edge(w.complement(), u.complement());
    }
    debug!("removed {} transitive edges", doomed.len());
    doomed.len()
}

/// Walk a bubble branch: a chain of single-in single-out vertices from
/// `start`, ending at the first vertex with other entries (the sink).
fn bubble_branch(
    sg: &ScaffoldGraph,
    start: ContigNode,
) -> Option<(Vec<ContigNode>, ContigNode, u64)> {
    let mut chain = Vec::new();
    let mut pairs: u64 = 0;
    let mut current = start;
    for _ in 0..MAX_BUBBLE_BRANCH {
        if sg.in_degree(current) != 1 {
            return None;
        }
        chain.push(current);
        let mut succs = sg.g.neighbors_directed(current, Direction::Outgoing);
        let next = succs.next()?;
        if succs.next().is_some() {
            return None;
        }
        pairs += u64::from(sg.g.edge_weight(current, next)?.num_pairs);
        if sg.in_degree(next) > 1 {
            return Some((chain, next, pairs));
        }
        current = next;
    }
    None
}

/// Pop bubbles in the scaffold graph: two branches of a fork reconverging
/// on one sink. The branch with the higher total pair support survives.
/// Returns the vertices removed.
pub fn pop_bubbles(sg: &mut ScaffoldGraph) -> Vec<ContigNode> {
    let mut popped = Vec::new();
    let nodes: Vec<ContigNode> = sg.g.nodes().collect();
    for u in nodes {
        if !sg.g.contains_node(u) || sg.out_degree(u) != 2 {
            continue;
        }
        let succs: Vec<ContigNode> = sg.g.neighbors_directed(u, Direction::Outgoing).collect();
        let Some((chain_a, sink_a, pairs_a)) = bubble_branch(sg, succs[0]) else { continue };
        let Some((chain_b, sink_b, pairs_b)) = bubble_branch(sg, succs[1]) else { continue };
        if sink_a != sink_b || sink_a == u {
            continue;
        }
        let entry_a = sg.g.edge_weight(u, succs[0]).map_or(0, |e| u64::from(e.num_pairs));
        let entry_b = sg.g.edge_weight(u, succs[1]).map_or(0, |e| u64::from(e.num_pairs));
        let loser = if pairs_a + entry_a >= pairs_b + entry_b { chain_b } else { chain_a };
        let mut seen: AHashSet<u32> = AHashSet::new();
        for v in loser {
            if seen.insert(v.id()) {
                sg.remove_vertex_pair(v);
                popped.push(v);
            }
        }
    }
    debug!("popped {} bubble vertices", popped.len());
    popped
}

/// Remove weak edges: u1 fans out to {v1,v2}, v2 fans in from {u1,u2},
/// v1 and u2 are otherwise simple, and (u1,v2) is the worst-supported
/// edge of the motif.
pub fn remove_weak_edges(sg: &mut ScaffoldGraph) -> usize {
    let mut weak: Vec<(ContigNode, ContigNode)> = Vec::new();
    for (u1, v2, est) in sg.g.all_edges() {
        if sg.out_degree(u1) != 2 || sg.in_degree(v2) != 2 {
            continue;
        }
        let Some(v1) = sg
            .g
            .neighbors_directed(u1, Direction::Outgoing)
            .find(|&v| v != v2)
        else {
            continue;
        };
        if sg.in_degree(v1) != 1 {
            continue;
        }
        let Some(u2) = sg
            .g
            .neighbors_directed(v2, Direction::Incoming)
            .find(|&u| u != u1)
        else {
            continue;
        };
        if sg.out_degree(u2) != 1 {
            continue;
        }
        let n = est.num_pairs;
        let n11 = sg.g.edge_weight(u1, v1).map_or(0, |e| e.num_pairs);
        let n22 = sg.g.edge_weight(u2, v2).map_or(0, |e| e.num_pairs);
        if n < n11 && n < n22 {
            weak.push((u1, v2));
        }
    }

    weak.sort();
    weak.dedup();
    for &(u, v) in &weak {
        sg.g.remove_edge(u, v);
        sg.g.remove_edge(v.complement(), u.complement());
    }
    debug!("removed {} weak edges", weak.len());
    weak.len()
}

/// Drop edges whose gap estimate exceeds `max_gap`.
pub fn remove_long_edges(sg: &mut ScaffoldGraph, max_gap: i32) -> usize {
    let long: Vec<(ContigNode, ContigNode)> = sg
        .g
        .all_edges()
        .filter(|&(_, _, est)| est.distance > max_gap)
        .map(|(u, v, _)| (u, v))
        .collect();
    for &(u, v) in &long {
        sg.g.remove_edge(u, v);
    }
    long.len()
}
