// src/pipeline/assemble.rs
//! The assembly driver: load reads, clean the graph, emit contigs.
//!
//! Pass order follows the classic single-k de Bruijn recipe: load, pick
//! coverage parameters from the histogram, apply the k-mer multiplicity
//! floor, generate adjacency, then iterate erosion / trimming /
//! low-coverage removal to a fixed point, pop bubbles, and walk the
//! remaining unambiguous runs into contigs.

use std::io::BufWriter;

use anyhow::{bail, Context, Result};
use crossbeam_channel::bounded;
use tracing::info;

use crate::graph::assembler::{assemble, mark_ambiguous, remove_low_coverage};
use crate::graph::bubbles::pop_bubbles;
use crate::graph::erode::erode_ends;
use crate::graph::histogram::{
    apply_kmer_coverage_threshold, set_coverage_parameters, CoverageHistogram,
};
use crate::graph::trim::perform_trim;
use crate::graph::{flags, Contig, SequenceCollection};
use crate::io::dot::write_adjacency;
use crate::io::fasta::{FastaWriter, SeqReader};
use crate::kmer::bloom::BloomFilter;
use crate::kmer::{Kmer, RollingHashIter};
use crate::stats::{snr, AssemblyStats};
use crate::telemetry::{record, Telemetry};

/// Options for one assembly pass, CLI-shaped.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub k: usize,
    /// Mean-coverage threshold for contig removal; None derives it from
    /// the histogram, negative disables.
    pub coverage: Option<f32>,
    /// Minimum k-mer multiplicity; 0 disables.
    pub kc: u16,
    pub erode: Option<u16>,
    pub erode_strand: Option<u16>,
    /// Maximum dead-end chain length to trim; None defaults to k.
    pub trim_len: Option<usize>,
    /// Maximum bubble branch length; None defaults to 3k.
    pub bubble_len: Option<usize>,
    pub graph_path: Option<String>,
    pub contigs_path: String,
    /// Megabytes of Bloom filter for singleton pre-filtering; 0 disables.
    pub bloom_mb: usize,
    pub threads: usize,
    pub inputs: Vec<String>,
}

/// Queue capacity between the parsing producer and inserting consumers.
const LOAD_QUEUE: usize = 1024;

/// Hash functions used against the singleton filter.
const BLOOM_HASHES: usize = 4;

/// Stream every input into the collection. One producer parses records;
/// the worker pool canonicalizes and inserts k-mer windows, with the
/// bounded queue providing backpressure. With a singleton filter, the
/// first observation of a k-mer only primes the filter; the k-mer enters
/// the table on a repeat sighting.
fn load_sequences(
    g: &SequenceCollection,
    inputs: &[String],
    k: usize,
    threads: usize,
    bloom: Option<&BloomFilter>,
) -> Result<(usize, usize)> {
    let mut short_records = 0usize;
    let mut parse_skipped = 0usize;

    std::thread::scope(|scope| -> Result<()> {
        // The channel lives inside the scope: an early error return drops
        // the sender, so the workers drain out and the scope can join.
        let (tx, rx) = bounded::<String>(LOAD_QUEUE);
        let workers: Vec<_> = (0..threads.max(1))
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || {
                    let mut hashes = [0u64; BLOOM_HASHES];
                    for sequence in rx.iter() {
                        let bytes = sequence.as_bytes();
                        // The rolling iterator admits exactly the windows
                        // whose participating positions are ACGT.
                        let mut windows = RollingHashIter::new(bytes, BLOOM_HASHES, k);
                        while let Some((pos, _)) = windows.next() {
                            if let Some(filter) = bloom {
                                let state = windows.state().expect("state follows yield");
                                state.hashes(&mut hashes);
                                if !filter.insert_and_check(&hashes) {
                                    continue;
                                }
                            }
                            if let Ok(kmer) = Kmer::from_bytes(&bytes[pos..pos + k]) {
                                g.insert(&kmer);
                            }
                        }
                    }
                })
            })
            .collect();

        for path in inputs {
            info!("loading `{}'", path);
            let mut reader = SeqReader::open(path)?;
            for record in reader.by_ref() {
                let record = record.with_context(|| format!("reading `{}'", path))?;
                if record.sequence.len() < k {
                    short_records += 1;
                    continue;
                }
                tx.send(record.sequence).expect("load workers alive");
            }
            parse_skipped += reader.skipped;
        }
        drop(tx);
        for worker in workers {
            worker.join().expect("load worker panicked");
        }
        Ok(())
    })?;

    Ok((short_records, parse_skipped))
}

/// Run one complete assembly at the configured k. Returns the contigs and
/// summary statistics; the contigs FASTA (and optional graph and bubble
/// files) are written as side effects.
pub fn assemble_reads(
    opts: &AssembleOptions,
    telemetry: Option<&Telemetry>,
) -> Result<(Vec<Contig>, AssemblyStats)> {
    let k = opts.k;
    let g = SequenceCollection::new();

    let bloom = (opts.bloom_mb > 0).then(|| {
        info!("singleton filter: {} MB Bloom", opts.bloom_mb);
        BloomFilter::with_memory(opts.bloom_mb << 20)
    });
    let (short_records, parse_skipped) =
        load_sequences(&g, &opts.inputs, k, opts.threads, bloom.as_ref())?;
    let loaded = g.len();
    info!("loaded {} k-mer", loaded);
    if short_records + parse_skipped > 0 {
        info!(
            "skipped {} records shorter than k, {} malformed",
            short_records, parse_skipped
        );
    }
    record(telemetry, "load", "loadedKmer", loaded as i64);
    if g.is_empty() {
        bail!("no usable sequence");
    }

    let histogram = CoverageHistogram::build(&g);
    let mut params = set_coverage_parameters(
        &histogram,
        opts.coverage,
        opts.erode,
        opts.erode_strand,
    );

    if opts.kc > 0 {
        info!("removing k-mers with multiplicity below {}", opts.kc);
        let removed = apply_kmer_coverage_threshold(&g, opts.kc);
        info!("removed {} low-multiplicity k-mers, {} remaining", removed, g.len());
        record(telemetry, "kc", "removed", removed as i64);
    }

    info!("generating adjacency");
    g.generate_adjacency();

    let trim_len = opts.trim_len.unwrap_or(k);
    // Erode, trim, and excise low-coverage contigs until stable. The
    // coverage threshold is consumed by its first application.
    loop {
        if params.erode > 0 || params.erode_strand > 0 {
            info!("eroding tips");
            let eroded = erode_ends(&g, &params);
            record(telemetry, "erode", "removed", eroded as i64);
        }
        // The SEEN bits carried strand observations for erosion; from here
        // on they track walk emission and must start clear.
        g.wipe_flag(flags::SEEN);
        let trimmed = perform_trim(&g, trim_len);
        record(telemetry, "trim", "removed", trimmed as i64);

        if params.coverage > 0.0 {
            info!(
                "removing low-coverage contigs (mean k-mer coverage < {})",
                params.coverage
            );
            mark_ambiguous(&g);
            let (kmers_removed, contigs_removed) =
                remove_low_coverage(&g, f64::from(params.coverage));
            g.wipe_flag(flags::MARK);
            g.cleanup();
            record(telemetry, "coverage", "contigsRemoved", contigs_removed as i64);
            params.coverage = 0.0;
            if kmers_removed > 0 {
                continue;
            }
        }
        break;
    }

    let bubble_len = opts.bubble_len.unwrap_or(3 * k);
    if bubble_len > 0 {
        info!("popping bubbles");
        let (popped, bubbles) = pop_bubbles(&g, bubble_len);
        record(telemetry, "bubbles", "popped", popped as i64);
        if !bubbles.is_empty() {
            let path = format!("{}.bubbles.fa", opts.contigs_path.trim_end_matches(".gz"));
            let mut writer = FastaWriter::create(&path)?;
            for (i, bubble) in bubbles.iter().enumerate() {
                for (j, branch) in bubble.branches.iter().enumerate() {
                    writer.write_record(&format!("bubble{}_{}", i, j), branch)?;
                }
            }
            writer.finish()?;
            info!("wrote {} bubbles to `{}'", bubbles.len(), path);
        }
    }

    if let Some(graph_path) = &opts.graph_path {
        info!("writing graph to `{}'", graph_path);
        let file = std::fs::File::create(graph_path)
            .with_context(|| format!("creating `{}'", graph_path))?;
        write_adjacency(&mut BufWriter::new(file), &g, k)?;
    }

    mark_ambiguous(&g);
    let contigs = assemble(&g);
    if contigs.is_empty() {
        bail!("no contigs assembled");
    }

    let mut writer = FastaWriter::create(&opts.contigs_path)?;
    for contig in &contigs {
        writer.write_contig(contig)?;
    }
    writer.finish()?;
    info!("wrote {} contigs to `{}'", contigs.len(), opts.contigs_path);

    let assembled = g.len();
    let removed = loaded.saturating_sub(assembled);
    info!(
        "removed {} k-mer; the signal-to-noise ratio (SNR) is {:.1} dB",
        removed,
        snr(assembled, removed)
    );
    record(telemetry, "assemble", "contigs", contigs.len() as i64);
    record(telemetry, "assemble", "kmersAssembled", assembled as i64);

    let stats = AssemblyStats::from_contigs(
        contigs.iter().map(|c| c.len() as u64),
        assembled,
        removed,
    );
    Ok((contigs, stats))
}
