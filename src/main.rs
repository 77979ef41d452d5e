use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use kestrel::cli_main::Cli;
use kestrel::kmer::{Kmer, SeedMask};
use kestrel::pipeline::{assemble_reads, AssembleOptions};
use kestrel::telemetry::{record, Telemetry};

fn run(cli: &Cli) -> Result<()> {
    ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .expect("building the thread pool");

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
            let t = Telemetry::open(path, "kestrel", &meta)?;
            t.add("meta", "k", cli.k.min as i64)?;
            t.add("meta", "SS", i64::from(cli.ss))?;
            Some(t)
        }
        None => None,
    };

    if cli.mask.is_some() && cli.k.is_range() {
        bail!("a spaced seed cannot be combined with a k range");
    }

    if cli.k.is_range() {
        info!(
            "assembling k={}-{}:{}",
            cli.k.min, cli.k.max, cli.k.step
        );
    }

    let ks: Vec<usize> = cli.k.values().collect();
    let mut carry: Option<String> = None;
    for (i, &k) in ks.iter().enumerate() {
        if cli.k.is_range() {
            info!("assembling k={}", k);
        }
        Kmer::set_length(k);
        if let Some(seed) = &cli.mask {
            SeedMask::install(Some(SeedMask::parse(seed).map_err(anyhow::Error::msg)?));
        }

        let last = i + 1 == ks.len();
        let contigs_path = if last {
            cli.out.clone()
        } else {
            format!("contigs-k{}.fa", k)
        };

        let mut inputs = cli.inputs.clone();
        if let Some(prev) = carry.take() {
            inputs.push(prev);
        }

        // User-supplied cleaning parameters apply to the first k only;
        // later passes re-derive the defaults at their own k.
        let first = i == 0;
        let opts = AssembleOptions {
            k,
            coverage: if first { cli.coverage } else { None },
            kc: if first { cli.kc } else { 0 },
            erode: if first { cli.erode } else { None },
            erode_strand: if first { cli.erode_strand } else { None },
            trim_len: if first { cli.trim_len } else { None },
            bubble_len: if first { cli.bubble_len } else { None },
            graph_path: if last { cli.graph.clone() } else { None },
            contigs_path: contigs_path.clone(),
            bloom_mb: cli.bloom,
            threads: cli.threads,
            inputs,
        };

        let (contigs, stats) = assemble_reads(&opts, telemetry.as_ref())?;
        record(telemetry.as_ref(), "assemble", "n50", stats.n50 as i64);
        info!(
            "k={}: {} contigs, N50 {}, total {} bp",
            k,
            contigs.len(),
            stats.n50,
            stats.total_length
        );

        if last {
            if let Some(path) = &cli.json_stats {
                std::fs::write(path, serde_json::to_string_pretty(&stats)?)?;
            }
        } else {
            carry = Some(contigs_path);
        }
    }

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
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kestrel: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
