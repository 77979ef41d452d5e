// src/scaffold/graph.rs
//! Distance-estimate graph over oriented contigs.
//!
//! Vertices are (contig id, orientation) pairs; edge attributes are the
//! estimated distance between the two contigs (negative for overlap), its
//! standard deviation (0 encodes an exact overlap) and the number of read
//! pairs supporting it. The graph keeps reverse-complement symmetry: every
//! edge u->v has a twin v~->u~ with the same attributes.

use std::fmt;

use ahash::AHashMap;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracing::debug;

/// An oriented contig: id plus strand bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContigNode(u32);

impl ContigNode {
    pub fn new(id: u32, rc: bool) -> ContigNode {
        ContigNode(id << 1 | rc as u32)
    }

    #[inline]
    pub fn id(self) -> u32 {
        self.0 >> 1
    }

    #[inline]
    pub fn is_rc(self) -> bool {
        self.0 & 1 == 1
    }

    /// The same contig on the opposite strand.
    #[inline]
    pub fn complement(self) -> ContigNode {
        ContigNode(self.0 ^ 1)
    }

    pub fn sign(self) -> char {
        if self.is_rc() {
            '-'
        } else {
            '+'
        }
    }
}

/// Distance estimate between two oriented contigs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEst {
    /// Estimated gap in bases; negative denotes overlap.
    pub distance: i32,
    /// Standard deviation of the estimate; 0 encodes an exact overlap.
    pub std_dev: f32,
    /// Supporting read-pair count.
    pub num_pairs: u32,
}

impl DistanceEst {
    /// An exact overlap carries no gap to fill.
    pub fn is_overlap(&self) -> bool {
        self.std_dev == 0.0 && self.distance < 0
    }
}

impl fmt::Display for DistanceEst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d={} n={} s={:.1}", self.distance, self.num_pairs, self.std_dev)
    }
}

/// The two-sided scaffold graph plus the contig name/length tables.
#[derive(Clone, Default)]
pub struct ScaffoldGraph {
    pub g: DiGraphMap<ContigNode, DistanceEst>,
    names: Vec<String>,
    ids: AHashMap<String, u32>,
    lengths: Vec<u32>,
}

impl ScaffoldGraph {
    pub fn new() -> ScaffoldGraph {
        ScaffoldGraph::default()
    }

    /// Look up or create the id for a contig name.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        self.lengths.push(0);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    pub fn set_length(&mut self, id: u32, length: u32) {
        self.lengths[id as usize] = length;
    }

    pub fn length(&self, id: u32) -> u32 {
        self.lengths[id as usize]
    }

    pub fn num_contigs(&self) -> usize {
        self.names.len()
    }

    /// Parse an oriented contig token like `c12+` or `c12-`, interning the
    /// name.
    pub fn intern_node(&mut self, token: &str) -> Option<ContigNode> {
        let (name, rc) = token.strip_suffix('+').map(|n| (n, false)).or_else(|| {
            token.strip_suffix('-').map(|n| (n, true))
        })?;
        let id = self.intern(name);
        Some(ContigNode::new(id, rc))
    }

    pub fn node_token(&self, node: ContigNode) -> String {
        format!("{}{}", self.name(node.id()), node.sign())
    }

    /// Add an edge; the complementary twin is not added here (the loader
    /// restores symmetry once, after reading everything).
    pub fn add_edge(&mut self, u: ContigNode, v: ContigNode, est: DistanceEst) {
        self.g.add_edge(u, v, est);
    }

    /// Add both orientations of every known contig as graph nodes.
    pub fn add_contig_nodes(&mut self) {
        for id in 0..self.names.len() as u32 {
            self.g.add_node(ContigNode::new(id, false));
            self.g.add_node(ContigNode::new(id, true));
        }
    }

    /// Add every missing complementary edge v~ -> u~. Returns how many were
    /// added.
    pub fn add_complementary_edges(&mut self) -> usize {
        let missing: Vec<(ContigNode, ContigNode, DistanceEst)> = self
            .g
            .all_edges()
            .filter(|&(u, v, _)| !self.g.contains_edge(v.complement(), u.complement()))
            .map(|(u, v, est)| (v.complement(), u.complement(), *est))
            .collect();
        let n = missing.len();
        for (u, v, est) in missing {
            self.g.add_edge(u, v, est);
        }
        if n > 0 {
            debug!("added {} complementary edges", n);
        }
        n
    }

    /// Drop edges whose overlap exceeds either incident contig: the
    /// estimate cannot be right. Returns how many were removed.
    pub fn remove_invalid_edges(&mut self) -> usize {
        let invalid: Vec<(ContigNode, ContigNode)> = self
            .g
            .all_edges()
            .filter(|&(u, v, est)| {
                let d = i64::from(est.distance);
                d + i64::from(self.length(u.id())) <= 0 || d + i64::from(self.length(v.id())) <= 0
            })
            .map(|(u, v, _)| (u, v))
            .collect();
        for (u, v) in &invalid {
            self.g.remove_edge(*u, *v);
        }
        invalid.len()
    }

    pub fn out_degree(&self, u: ContigNode) -> usize {
        self.g.neighbors_directed(u, Direction::Outgoing).count()
    }

    pub fn in_degree(&self, u: ContigNode) -> usize {
        self.g.neighbors_directed(u, Direction::Incoming).count()
    }

    /// Remove a vertex and its complement.
    pub fn remove_vertex_pair(&mut self, u: ContigNode) {
        self.g.remove_node(u);
        self.g.remove_node(u.complement());
    }

    pub fn num_vertices(&self) -> usize {
        self.g.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.g.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(d: i32, n: u32) -> DistanceEst {
        DistanceEst { distance: d, std_dev: 1.0, num_pairs: n }
    }

    #[test]
    fn complement_arithmetic() {
        let u = ContigNode::new(7, false);
        assert_eq!(u.id(), 7);
        assert!(!u.is_rc());
        assert_eq!(u.complement().id(), 7);
        assert!(u.complement().is_rc());
        assert_eq!(u.complement().complement(), u);
    }

    #[test]
    fn loader_restores_symmetry() {
        let mut sg = ScaffoldGraph::new();
        let a = sg.intern_node("a+").unwrap();
        let b = sg.intern_node("b+").unwrap();
        sg.add_edge(a, b, est(100, 5));
        assert_eq!(sg.add_complementary_edges(), 1);
        let twin = sg.g.edge_weight(b.complement(), a.complement()).unwrap();
        assert_eq!(twin.distance, 100);
        assert_eq!(twin.num_pairs, 5);
        // Idempotent.
        assert_eq!(sg.add_complementary_edges(), 0);
    }

    #[test]
    fn invalid_overlap_edges_are_dropped() {
        let mut sg = ScaffoldGraph::new();
        let a = sg.intern_node("a+").unwrap();
        let b = sg.intern_node("b+").unwrap();
        sg.set_length(a.id(), 500);
        sg.set_length(b.id(), 300);
        // Overlap longer than b.
        sg.add_edge(a, b, DistanceEst { distance: -400, std_dev: 0.0, num_pairs: 9 });
        assert_eq!(sg.remove_invalid_edges(), 1);
        assert_eq!(sg.num_edges(), 0);
    }
}
