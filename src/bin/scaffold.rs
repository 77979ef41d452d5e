// src/bin/scaffold.rs
//! Scaffold contigs using a distance-estimate graph.

use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use kestrel::io::dot::{read_dist_graph, write_scaffold_graph};
use kestrel::io::fasta::{open_maybe_gz, read_contig_lengths};
use kestrel::scaffold::paths::{format_steps, insert_gaps};
use kestrel::scaffold::search::{
    optimize_grid, optimize_line, scaffold_pass, ScaffoldOptions, ScaffoldPass,
};
use kestrel::scaffold::ScaffoldGraph;
use kestrel::stats::contiguity_header;
use kestrel::telemetry::{record, Telemetry};

/// An n value or range: `N` or `A-B[:S]`.
#[derive(Debug, Clone, Copy)]
struct NRange {
    lo: u32,
    hi: u32,
    step: u32,
}

impl FromStr for NRange {
    type Err = String;

    fn from_str(s: &str) -> Result<NRange, String> {
        let parse = |t: &str| t.parse::<u32>().map_err(|_| format!("bad n value `{}'", t));
        let (range, step) = match s.split_once(':') {
            Some((range, step)) => (range, parse(step)?),
            None => (s, 1),
        };
        let (lo, hi) = match range.split_once('-') {
            Some((lo, hi)) => (parse(lo)?, parse(hi)?),
            None => {
                let n = parse(range)?;
                (n, n)
            }
        };
        if lo > hi || step == 0 {
            return Err(format!("bad n range `{}'", s));
        }
        Ok(NRange { lo, hi, step })
    }
}

/// An s value or range: `S` or `S-T`.
#[derive(Debug, Clone, Copy)]
struct SRange {
    lo: u32,
    hi: u32,
}

impl FromStr for SRange {
    type Err = String;

    fn from_str(s: &str) -> Result<SRange, String> {
        let parse = |t: &str| t.parse::<u32>().map_err(|_| format!("bad s value `{}'", t));
        let (lo, hi) = match s.split_once('-') {
            Some((lo, hi)) => (parse(lo)?, parse(hi)?),
            None => {
                let v = parse(s)?;
                (v, v)
            }
        };
        if lo > hi {
            return Err(format!("bad s range `{}'", s));
        }
        Ok(SRange { lo, hi })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "kestrel-scaffold",
    version,
    about = "Scaffold contigs using the distance estimate graph",
    long_about = None
)]
struct Cli {
    /// Length of a k-mer
    #[arg(short, long = "kmer")]
    k: usize,

    /// Minimum number of pairs, or a range A-B:S to search
    #[arg(short = 'n', long = "npairs", default_value = "0")]
    npairs: NRange,

    /// Minimum contig length, or a range S-T to search
    #[arg(short = 's', long = "seed-length", default_value = "1000")]
    seed_length: SRange,

    /// Expected genome size, enables NG50 in the metrics
    #[arg(short = 'G', long)]
    genome_size: Option<f64>,

    /// Minimum scaffold gap length to output
    #[arg(long, default_value_t = 50)]
    min_gap: i32,

    /// Maximum scaffold gap length to output (unlimited when negative)
    #[arg(long, default_value_t = -1)]
    max_gap: i64,

    /// Optimize using a grid search [default]
    #[arg(long, overrides_with = "line")]
    grid: bool,

    /// Optimize using a line search
    #[arg(long)]
    line: bool,

    /// Remove complex transitive edges
    #[arg(long, overrides_with = "no_complex")]
    complex: bool,

    /// Don't remove complex transitive edges [default]
    #[arg(long = "no-complex")]
    no_complex: bool,

    /// Expect contigs to be oriented correctly
    #[arg(long = "SS", overrides_with = "no_ss")]
    ss: bool,

    /// No assumption about contig orientation [default]
    #[arg(long = "no-SS")]
    no_ss: bool,

    /// Write the paths to this file (stdout when omitted)
    #[arg(short, long)]
    out: Option<String>,

    /// Write the cleaned graph to this file
    #[arg(short, long)]
    graph: Option<String>,

    /// Record telemetry into this SQLite database
    #[arg(long)]
    db: Option<String>,

    /// Library name for telemetry
    #[arg(long)]
    library: Option<String>,

    /// Strain name for telemetry
    #[arg(long)]
    strain: Option<String>,

    /// Species name for telemetry
    #[arg(long)]
    species: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Contigs (FASTA) and distance estimate graphs (DOT)
    #[arg(required = true)]
    files: Vec<String>,
}

fn is_fasta(path: &str) -> Result<bool> {
    let mut reader = open_maybe_gz(path)?;
    let buf = reader.fill_buf()?;
    Ok(buf.first() == Some(&b'>'))
}

fn load(cli: &Cli) -> Result<ScaffoldGraph> {
    let mut sg = ScaffoldGraph::new();
    for path in &cli.files {
        if is_fasta(path)? {
            info!("reading contigs from `{}'", path);
            for (name, length) in read_contig_lengths(path)? {
                let id = sg.intern(&name);
                sg.set_length(id, length);
            }
        } else {
            info!("reading distance estimates from `{}'", path);
            let reader = open_maybe_gz(path)?;
            let (edges, skipped) =
                read_dist_graph(reader, &mut sg).with_context(|| format!("reading `{}'", path))?;
            info!("read {} edges", edges);
            if skipped > 0 {
                warn!("skipped {} malformed lines in `{}'", skipped, path);
            }
        }
    }
    sg.add_contig_nodes();

    let added = sg.add_complementary_edges();
    info!("added {} complementary edges", added);
    let invalid = sg.remove_invalid_edges();
    if invalid > 0 {
        warn!("removed {} invalid edges", invalid);
    }
    Ok(sg)
}

fn write_output(cli: &Cli, g0: &ScaffoldGraph, pass: &ScaffoldPass) -> Result<()> {
    let mut out: Box<dyn Write> = match cli.out.as_deref() {
        None | Some("-") => Box::new(std::io::stdout().lock()),
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("creating `{}'", path))?,
        )),
    };
    for (i, path) in pass.paths.iter().enumerate() {
        let steps = insert_gaps(g0, &pass.graph, path, cli.min_gap, cli.k);
        writeln!(out, "scaffold{}\t{}", i, format_steps(&pass.graph, &steps))?;
    }
    out.flush()?;

    if let Some(path) = &cli.graph {
        info!("writing graph to `{}'", path);
        let file =
            std::fs::File::create(path).with_context(|| format!("creating `{}'", path))?;
        write_scaffold_graph(&mut BufWriter::new(file), &pass.graph)?;
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let telemetry = match &cli.db {
        Some(path) => {
            let mut meta: Vec<(&str, String)> = Vec::new();
            if let Some(v) = &cli.library {
                meta.push(("library", v.clone()));
            }
            if let Some(v) = &cli.strain {
                meta.push(("strain", v.clone()));
            }
            if let Some(v) = &cli.species {
                meta.push(("species", v.clone()));
            }
            let t = Telemetry::open(path, "kestrel-scaffold", &meta)?;
            t.add("meta", "K", cli.k as i64)?;
            Some(t)
        }
        None => None,
    };

    let g0 = load(cli)?;
    info!("graph: {} vertices, {} edges", g0.num_vertices(), g0.num_edges());

    let opts = ScaffoldOptions {
        k: cli.k,
        min_gap: cli.min_gap,
        max_gap: (cli.max_gap >= 0).then(|| cli.max_gap as i32),
        complex: cli.complex && !cli.no_complex,
        ss: cli.ss && !cli.no_ss,
        genome_size: cli.genome_size.map(|g| g as u64),
    };

    let n = cli.npairs;
    let s = cli.seed_length;
    let singleton = n.lo == n.hi && s.lo == s.hi;

    let best = if singleton {
        None
    } else if cli.line {
        Some(optimize_line(&g0, (n.lo, n.hi), n.step, (s.lo, s.hi), &opts))
    } else {
        Some(optimize_grid(&g0, (n.lo, n.hi), n.step, (s.lo, s.hi), &opts))
    };

    let (best_n, best_s) = match &best {
        Some(b) => (b.n, b.s),
        None => (n.lo, s.lo),
    };
    let pass = scaffold_pass(&g0, best_n, best_s, &opts);
    write_output(cli, &g0, &pass)?;

    eprintln!("{}", contiguity_header(opts.genome_size));
    if let Some(best) = &best {
        eprint!("{}", best.metrics);
        eprintln!(
            "Best scaffold N50 is {} at n={} s={}.",
            best.n50, best.n, best.s
        );
    } else {
        eprintln!("{}", pass.result.metrics);
    }

    record(telemetry.as_ref(), "scaffold", "n", i64::from(best_n));
    record(telemetry.as_ref(), "scaffold", "s", i64::from(best_s));
    record(telemetry.as_ref(), "scaffold", "N50", pass.result.n50 as i64);
    record(
        telemetry.as_ref(),
        "scaffold",
        "scaffolds",
        pass.paths.iter().filter(|p| p.len() >= 2).count() as i64,
    );

    Ok(())
}

fn main() -> ExitCode {
    // Bad options exit 1 with usage; --help and --version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let failed = e.use_stderr();
            let _ = e.print();
            return if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kestrel-scaffold: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
