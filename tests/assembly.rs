//! End-to-end assembler scenarios: reads in, contigs FASTA out.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

use kestrel::graph::SequenceCollection;
use kestrel::kmer::Kmer;
use kestrel::pipeline::{assemble_reads, AssembleOptions};

/// The k-mer length is process-wide; assembly tests must not interleave.
fn lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn write_reads(dir: &TempDir, name: &str, reads: &[(&str, usize)]) -> String {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    for (i, &(seq, times)) in reads.iter().enumerate() {
        for j in 0..times {
            writeln!(f, ">r{}_{}", i, j).unwrap();
            writeln!(f, "{}", seq).unwrap();
        }
    }
    path.to_str().unwrap().to_string()
}

fn options(dir: &TempDir, k: usize, inputs: Vec<String>) -> AssembleOptions {
    AssembleOptions {
        k,
        coverage: Some(0.0),
        kc: 0,
        erode: Some(0),
        erode_strand: Some(0),
        trim_len: Some(0),
        bubble_len: None,
        graph_path: None,
        contigs_path: dir.path().join("contigs.fa").to_str().unwrap().to_string(),
        bloom_mb: 0,
        threads: 2,
        inputs,
    }
}

fn read_fasta(path: &str) -> Vec<(String, String)> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut out = Vec::new();
    let mut lines = text.lines();
    while let (Some(header), Some(seq)) = (lines.next(), lines.next()) {
        out.push((header.to_string(), seq.to_string()));
    }
    out
}

#[test]
fn linear_reads_assemble_to_one_contig() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    let genome = "AATTACTGACCGTTACCAGATTACA";
    let input = write_reads(&dir, "reads.fa", &[(genome, 3)]);
    let opts = options(&dir, 21, vec![input]);

    let (contigs, stats) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 1);
    assert_eq!(contigs[0].len(), genome.len());
    assert_eq!(stats.contigs, 1);
    assert_eq!(stats.n50, genome.len() as u64);

    // Header format: >ID LEN MEANCOV.
    let records = read_fasta(&opts.contigs_path);
    assert_eq!(records.len(), 1);
    let fields: Vec<&str> = records[0].0[1..].split(' ').collect();
    assert_eq!(fields[0], "0");
    assert_eq!(fields[1], genome.len().to_string());
    assert_eq!(fields[2], "3.0");
}

#[test]
fn bubble_is_popped_end_to_end() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    // Two alleles differing at one base; the strong one must win and the
    // assembly collapse to a single contig.
    let strong = "GGCTAATTACTGCAGGACCGTTAGCA";
    let weak = "GGCTAATTACTGAAGGACCGTTAGCA";
    let input = write_reads(&dir, "reads.fa", &[(strong, 5), (weak, 1)]);
    let mut opts = options(&dir, 5, vec![input]);
    opts.bubble_len = Some(15);

    let (contigs, _) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 1);
    assert_eq!(contigs[0].sequence.len(), strong.len());

    // The popped alternates were recorded for audit.
    let bubbles = dir.path().join("contigs.fa.bubbles.fa");
    let records = read_fasta(bubbles.to_str().unwrap());
    assert!(records.len() >= 2);
}

#[test]
fn low_coverage_contig_is_excised() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    let strong = "AATTACTGACCGTTACCAGATTACA";
    let weak = "CCGGATTCGGTACGGATCCTATGGC";
    let input = write_reads(&dir, "reads.fa", &[(strong, 4), (weak, 1)]);
    let mut opts = options(&dir, 21, vec![input]);
    opts.coverage = Some(2.0);

    let (contigs, stats) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 1);
    assert!(
        contigs[0].sequence == strong
            || contigs[0].sequence == kestrel::kmer::kmer::reverse_complement_str(strong)
    );
    assert!(stats.kmers_removed > 0);
    assert!(stats.snr_db.is_finite());
}

#[test]
fn empty_input_is_fatal() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    // Every record shorter than k.
    let input = write_reads(&dir, "reads.fa", &[("ACGT", 3)]);
    let opts = options(&dir, 21, vec![input]);

    let err = assemble_reads(&opts, None).unwrap_err();
    assert!(err.to_string().contains("no usable sequence"));
}

#[test]
fn missing_input_is_fatal() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    let opts = options(&dir, 21, vec!["/nonexistent/reads.fa".to_string()]);
    assert!(assemble_reads(&opts, None).is_err());
}

#[test]
fn tiny_k_canonical_vertex_set() {
    let _guard = lock();
    Kmer::set_length(3);
    let g = SequenceCollection::new();
    let read = "ACGTACGT";
    for i in 0..=read.len() - 3 {
        g.insert(&Kmer::from_str(&read[i..i + 3]).unwrap());
    }
    // Windows {ACG, CGT, GTA, TAC}: CGT and TAC are reverse complements
    // of ACG and GTA, so two canonical records remain.
    let mut names = Vec::new();
    g.for_each(|k, _| names.push(k.to_string()));
    names.sort();
    assert_eq!(names, vec!["ACG", "GTA"]);
}

#[test]
fn singleton_filter_keeps_one_off_kmers_out() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    let strong = "AATTACTGACCGTTACCAGATTACA";
    let weak = "CCGGATTCGGTACGGATCCTATGGC";
    let input = write_reads(&dir, "reads.fa", &[(strong, 3), (weak, 1)]);
    let mut opts = options(&dir, 21, vec![input]);
    opts.bloom_mb = 1;

    // The weak chain's k-mers occur once and never reach the table; no
    // coverage threshold is needed to drop them.
    let (contigs, _) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 1);
    assert_eq!(contigs[0].len(), strong.len());
}

#[test]
fn gzip_input_is_detected_by_magic_bytes() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    let genome = "AATTACTGACCGTTACCAGATTACA";
    // Name ends in .fa, contents are gzip: only the magic bytes can tell.
    let path = dir.path().join("reads.fa");
    {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let f = std::fs::File::create(&path).unwrap();
        let mut gz = GzEncoder::new(f, Compression::default());
        for i in 0..3 {
            writeln!(gz, ">r{}\n{}", i, genome).unwrap();
        }
        gz.finish().unwrap();
    }
    let opts = options(&dir, 21, vec![path.to_str().unwrap().to_string()]);
    let (contigs, _) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 1);
}

#[test]
fn non_acgt_windows_are_skipped_per_position() {
    let _guard = lock();
    let dir = TempDir::new().unwrap();
    // An N in the middle: only windows spanning it are lost, the two
    // flanks still assemble.
    let read = "AATTACTGACCGTTANCCAGATTACAGGT";
    let input = write_reads(&dir, "reads.fa", &[(read, 3)]);
    let opts = options(&dir, 10, vec![input]);
    let (contigs, _) = assemble_reads(&opts, None).unwrap();
    assert_eq!(contigs.len(), 2);
}
