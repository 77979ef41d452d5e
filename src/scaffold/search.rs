// src/scaffold/search.rs
//! Scaffold parameter search.
//!
//! One evaluation runs the whole cleaning pipeline at a parameter point
//! (n = minimum pair support, s = minimum contig length) and scores the
//! result by scaffold N50. The grid strategy tries every point; the line
//! strategy alternates coordinate-wise optimization. Evaluations are
//! memoized by (n, s); a memo hit comes back with its metrics row blanked
//! so the final table lists each point once.

use ahash::AHashMap;
use tracing::{debug, info};

use crate::scaffold::cleanup::{
    filter_graph, pop_bubbles, prune_tips, remove_cycles, remove_long_edges, remove_repeats,
    remove_transitive_edges, remove_weak_edges, resolve_forks,
};
use crate::scaffold::graph::{ContigNode, ScaffoldGraph};
use crate::scaffold::paths::{assemble_paths, scaffold_length_histogram};
use crate::stats::contiguity_row;

/// Options shared by every evaluation.
#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    pub k: usize,
    pub min_gap: i32,
    /// None means no maximum.
    pub max_gap: Option<i32>,
    /// Remove complex transitive edges too.
    pub complex: bool,
    /// Contigs are already oriented (strand-specific data).
    pub ss: bool,
    /// Expected genome size, for NG50 in the metrics rows.
    pub genome_size: Option<u64>,
}

/// Result of one parameter point.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldResult {
    pub n: u32,
    pub s: u32,
    pub n50: u64,
    /// Contiguity table row; empty when served from the memo.
    pub metrics: String,
}

/// The cleaned graph and its paths, for writing the winning point's
/// output.
pub struct ScaffoldPass {
    pub graph: ScaffoldGraph,
    pub paths: Vec<Vec<ContigNode>>,
    pub result: ScaffoldResult,
}

/// Run the cleaning pipeline and path assembly at one parameter point.
pub fn scaffold_pass(g0: &ScaffoldGraph, n: u32, s: u32, opts: &ScaffoldOptions) -> ScaffoldPass {
    let mut g = g0.clone();
    filter_graph(&mut g, n, s);
    remove_cycles(&mut g);
    resolve_forks(&mut g, g0);
    prune_tips(&mut g);
    remove_repeats(&mut g);
    remove_transitive_edges(&mut g, opts.complex);
    prune_tips(&mut g);
    pop_bubbles(&mut g);
    remove_weak_edges(&mut g);
    if let Some(max_gap) = opts.max_gap {
        remove_long_edges(&mut g, max_gap);
    }

    let paths = assemble_paths(&g, opts.ss);
    let h = scaffold_length_histogram(&g, &paths);
    let n50 = h.trim_low(u64::from(s)).n50();
    let metrics = contiguity_row(
        &h,
        u64::from(s),
        opts.genome_size,
        &format!("n={} s={}", n, s),
    );
    debug!("scaffolded n={} s={}: N50 {}", n, s, n50);

    ScaffoldPass {
        graph: g,
        paths,
        result: ScaffoldResult { n, s, n50, metrics },
    }
}

/// Memo of evaluations keyed by (n, s).
pub type ScaffoldMemo = AHashMap<(u32, u32), ScaffoldResult>;

/// Memoized evaluation. A hit returns the cached result with an empty
/// metrics row.
pub fn scaffold_memoized(
    g0: &ScaffoldGraph,
    n: u32,
    s: u32,
    opts: &ScaffoldOptions,
    memo: &mut ScaffoldMemo,
) -> ScaffoldResult {
    if let Some(cached) = memo.get(&(n, s)) {
        let mut result = cached.clone();
        result.metrics.clear();
        return result;
    }
    let result = scaffold_pass(g0, n, s, opts).result;
    memo.insert((n, s), result.clone());
    result
}

/// The s values swept between lo and hi: geometric steps of the cube root
/// of ten, rounded to one significant figure.
pub fn s_sweep(lo: u32, hi: u32) -> Vec<u32> {
    if lo == hi {
        return vec![lo];
    }
    let lo = lo.max(1);
    let hi = hi.max(lo);
    let step = 10f64.cbrt();
    let first = (f64::from(lo).ln() / step.ln()).round() as i64;
    let last = (f64::from(hi).ln() / step.ln()).round() as i64;
    let mut out = Vec::new();
    for i in first..=last {
        let raw = step.powi(i as i32);
        let decade = 10f64.powf(raw.log10().floor());
        let s = ((raw / decade).round() * decade) as u32;
        if out.last() != Some(&s) {
            out.push(s);
        }
    }
    out
}

/// Best s for a fixed n.
fn optimize_s(
    g0: &ScaffoldGraph,
    n: u32,
    s_range: (u32, u32),
    opts: &ScaffoldOptions,
    memo: &mut ScaffoldMemo,
) -> ScaffoldResult {
    let mut best = ScaffoldResult { n, s: 0, n50: 0, metrics: String::new() };
    let mut table = String::new();
    for s in s_sweep(s_range.0, s_range.1) {
        let result = scaffold_memoized(g0, n, s, opts, memo);
        if !result.metrics.is_empty() {
            table.push_str(&result.metrics);
            table.push('\n');
        }
        if result.n50 > best.n50 {
            best = result;
        }
    }
    best.metrics = table;
    best
}

/// Best n for a fixed s.
fn optimize_n(
    g0: &ScaffoldGraph,
    n_range: (u32, u32),
    n_step: u32,
    s: u32,
    opts: &ScaffoldOptions,
    memo: &mut ScaffoldMemo,
) -> ScaffoldResult {
    let mut best = ScaffoldResult { n: 0, s, n50: 0, metrics: String::new() };
    let mut table = String::new();
    let mut n = n_range.0;
    while n <= n_range.1 {
        let result = scaffold_memoized(g0, n, s, opts, memo);
        if !result.metrics.is_empty() {
            table.push_str(&result.metrics);
            table.push('\n');
        }
        if result.n50 > best.n50 {
            best = result;
        }
        n += n_step.max(1);
    }
    best.metrics = table;
    best
}

/// Evaluate every (n, s) point; ties go to the smallest n, then the
/// smallest s.
pub fn optimize_grid(
    g0: &ScaffoldGraph,
    n_range: (u32, u32),
    n_step: u32,
    s_range: (u32, u32),
    opts: &ScaffoldOptions,
) -> ScaffoldResult {
    let mut memo = ScaffoldMemo::new();
    let mut best = ScaffoldResult::default();
    let mut table = String::new();
    let mut n = n_range.0;
    while n <= n_range.1 {
        let result = optimize_s(g0, n, s_range, opts, &mut memo);
        table.push_str(&result.metrics);
        if result.n50 > best.n50 {
            best = result;
        }
        n += n_step.max(1);
    }
    best.metrics = table;
    best
}

/// Alternate optimizing s and n from a midpoint start. Terminates when a
/// coordinate move changes nothing, bounded by the number of distinct n
/// values.
pub fn optimize_line(
    g0: &ScaffoldGraph,
    n_range: (u32, u32),
    n_step: u32,
    s_range: (u32, u32),
    opts: &ScaffoldOptions,
) -> ScaffoldResult {
    let mut memo = ScaffoldMemo::new();
    let mut table = String::new();
    let mut best = ScaffoldResult {
        n: (n_range.0 + n_range.1) / 2,
        s: s_range.1,
        n50: 0,
        metrics: String::new(),
    };
    let max_iterations = 1 + (n_range.1 - n_range.0) / n_step.max(1);
    for _ in 0..max_iterations {
        let previous_s = best.s;
        let n = best.n;
        info!("optimizing s for n={}", n);
        best = optimize_s(g0, n, s_range, opts, &mut memo);
        table.push_str(&best.metrics);
        if best.s == previous_s {
            break;
        }

        let previous_n = best.n;
        let s = best.s;
        info!("optimizing n for s={}", s);
        best = optimize_n(g0, n_range, n_step, s, opts, &mut memo);
        table.push_str(&best.metrics);
        if best.n == previous_n {
            break;
        }
    }
    info!("line search converged after {} evaluations", memo.len());
    best.metrics = table;
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::graph::DistanceEst;

    fn est(d: i32, n: u32) -> DistanceEst {
        DistanceEst { distance: d, std_dev: 1.0, num_pairs: n }
    }

    fn opts() -> ScaffoldOptions {
        ScaffoldOptions {
            k: 21,
            min_gap: 50,
            max_gap: None,
            complex: false,
            ss: false,
            genome_size: None,
        }
    }

    /// Three 2 kb contigs: a strong edge c1->c2 (n=5) and a weak edge
    /// c1->c3 (n=1).
    fn fork_graph() -> ScaffoldGraph {
        let mut sg = ScaffoldGraph::new();
        let c1 = sg.intern_node("c1+").unwrap();
        let c2 = sg.intern_node("c2+").unwrap();
        let c3 = sg.intern_node("c3+").unwrap();
        sg.add_edge(c1, c2, est(100, 5));
        sg.add_edge(c1, c3, est(100, 1));
        for id in 0..3 {
            sg.set_length(id, 2000);
        }
        sg.add_contig_nodes();
        sg.add_complementary_edges();
        sg
    }

    #[test]
    fn weak_edge_filtered_and_scaffolded() {
        let sg = fork_graph();
        let pass = scaffold_pass(&sg, 3, 1000, &opts());
        // c1-c2 joined, c3 left alone. Gaps do not count toward length.
        assert_eq!(pass.result.n50, 4000);
        let mut sizes: Vec<usize> = pass.paths.iter().map(|p| p.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn memo_hit_blanks_metrics() {
        let sg = fork_graph();
        let mut memo = ScaffoldMemo::new();
        let first = scaffold_memoized(&sg, 3, 1000, &opts(), &mut memo);
        assert!(!first.metrics.is_empty());
        let second = scaffold_memoized(&sg, 3, 1000, &opts(), &mut memo);
        assert!(second.metrics.is_empty());
        assert_eq!(second.n50, first.n50);
    }

    #[test]
    fn grid_and_line_agree_on_singleton_ranges() {
        let sg = fork_graph();
        let grid = optimize_grid(&sg, (3, 3), 1, (1000, 1000), &opts());
        let line = optimize_line(&sg, (3, 3), 1, (1000, 1000), &opts());
        assert_eq!(grid.n50, line.n50);
        assert_eq!((grid.n, grid.s), (line.n, line.s));
    }

    #[test]
    fn grid_evaluates_each_point_once() {
        let sg = fork_graph();
        let best = optimize_grid(&sg, (1, 3), 1, (500, 1000), &opts());
        // 3 n-values x |sweep(500..1000)| points, all listed once.
        let rows = best.metrics.lines().count();
        assert_eq!(rows, 3 * s_sweep(500, 1000).len());
        assert!(best.n50 > 0);
    }

    #[test]
    fn s_sweep_is_geometric_and_rounded() {
        let sweep = s_sweep(100, 10000);
        assert_eq!(sweep, vec![100, 200, 500, 1000, 2000, 5000, 10000]);
        assert_eq!(s_sweep(700, 700), vec![700]);
    }
}
