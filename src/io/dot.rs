// src/io/dot.rs
//! Graphviz DOT input and output.
//!
//! The assembler writes its adjacency graph as DOT for auditing. The
//! scaffolder reads distance-estimate graphs in a DOT-like form and writes
//! the cleaned graph back out. Edge attributes are `d` (distance), `n`
//! (pair support) and `s` (standard deviation); vertex attributes carry
//! the contig length as `l`.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::graph::SequenceCollection;
use crate::kmer::Dir;
use crate::scaffold::graph::{DistanceEst, ScaffoldGraph};

/// Write the de Bruijn adjacency graph. One edge line per live sense edge
/// of each canonical vertex.
pub fn write_adjacency<W: Write>(out: &mut W, g: &SequenceCollection, k: usize) -> Result<()> {
    writeln!(out, "digraph adj {{")?;
    writeln!(out, "k={}", k)?;
    let mut edges: Vec<(String, String)> = Vec::new();
    g.for_each(|kmer, _| {
        for code in g.get_edges(kmer, Dir::Sense).codes() {
            let neighbor = kmer.shift(Dir::Sense, code);
            edges.push((kmer.to_string(), neighbor.to_string()));
        }
    });
    edges.sort();
    for (u, v) in edges {
        writeln!(out, "\"{}\" -> \"{}\"", u, v)?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

/// Write the scaffold graph with lengths and distance estimates.
pub fn write_scaffold_graph<W: Write>(out: &mut W, sg: &ScaffoldGraph) -> Result<()> {
    writeln!(out, "digraph scaffold {{")?;
    let mut nodes: Vec<_> = sg.g.nodes().collect();
    nodes.sort();
    for u in &nodes {
        writeln!(out, "\"{}\" [l={}]", sg.node_token(*u), sg.length(u.id()))?;
    }
    let mut edges: Vec<_> = sg.g.all_edges().map(|(u, v, est)| (u, v, *est)).collect();
    edges.sort_by_key(|&(u, v, _)| (u, v));
    for (u, v, est) in edges {
        writeln!(
            out,
            "\"{}\" -> \"{}\" [{}]",
            sg.node_token(u),
            sg.node_token(v),
            est
        )?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

fn parse_attrs(attrs: &str) -> Result<DistanceEst> {
    let mut est = DistanceEst { distance: 0, std_dev: 0.0, num_pairs: 0 };
    for field in attrs.split_whitespace() {
        let Some((key, value)) = field.split_once('=') else {
            bail!("malformed attribute `{}'", field);
        };
        let value = value.trim_end_matches(',');
        match key {
            "d" => est.distance = value.parse().context("parsing d=")?,
            "n" => est.num_pairs = value.parse().context("parsing n=")?,
            "s" | "e" => est.std_dev = value.parse().context("parsing s=")?,
            _ => {} // tolerate unknown attributes
        }
    }
    Ok(est)
}

fn unquote(token: &str) -> &str {
    token.trim().trim_matches('"')
}

/// Read a distance-estimate graph into `sg`. Returns the number of edges
/// read. Unparseable lines are counted as skipped, not fatal.
pub fn read_dist_graph<R: BufRead>(reader: R, sg: &mut ScaffoldGraph) -> Result<(usize, usize)> {
    let mut edges = 0;
    let mut skipped = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("digraph")
            || line.starts_with('}')
            || line.starts_with("graph")
            || line.starts_with("//")
        {
            continue;
        }

        // Attribute block, if any.
        let (head, attrs) = match line.split_once('[') {
            Some((head, rest)) => (head.trim(), Some(rest.trim_end_matches([']', ';']).trim())),
            None => (line.trim_end_matches(';'), None),
        };

        if let Some((u, v)) = head.split_once("->") {
            let (Some(un), Some(vn)) = (sg.intern_node(unquote(u)), sg.intern_node(unquote(v)))
            else {
                skipped += 1;
                continue;
            };
            let est = match attrs.map(parse_attrs).transpose() {
                Ok(est) => est.unwrap_or(DistanceEst { distance: 0, std_dev: 0.0, num_pairs: 0 }),
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            sg.add_edge(un, vn, est);
            edges += 1;
        } else if let Some(attrs) = attrs {
            // Vertex line: "name+" [l=1234]
            let Some(node) = sg.intern_node(unquote(head)) else {
                skipped += 1;
                continue;
            };
            for field in attrs.split_whitespace() {
                if let Some(("l", value)) = field.split_once('=') {
                    if let Ok(len) = value.trim_end_matches(',').parse() {
                        sg.set_length(node.id(), len);
                    }
                }
            }
        } else {
            skipped += 1;
        }
    }
    Ok((edges, skipped))
}
