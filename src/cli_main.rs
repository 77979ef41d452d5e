// src/cli_main.rs
use std::str::FromStr;

use clap::Parser;

/// A k value or an inclusive k range with a step, as `K` or `KMIN-KMAX:STEP`.
#[derive(Debug, Clone, Copy)]
pub struct KRange {
    pub min: usize,
    pub max: usize,
    pub step: usize,
}

impl KRange {
    pub fn is_range(&self) -> bool {
        self.min != self.max
    }

    pub fn values(&self) -> impl Iterator<Item = usize> {
        (self.min..=self.max).step_by(self.step)
    }
}

impl FromStr for KRange {
    type Err = String;

    fn from_str(s: &str) -> Result<KRange, String> {
        let parse = |t: &str| t.parse::<usize>().map_err(|_| format!("bad k value `{}'", t));
        let (range, step) = match s.split_once(':') {
            Some((range, step)) => (range, parse(step)?),
            None => (s, 1),
        };
        let (min, max) = match range.split_once('-') {
            Some((lo, hi)) => (parse(lo)?, parse(hi)?),
            None => {
                let k = parse(range)?;
                (k, k)
            }
        };
        if min > max || step == 0 {
            return Err(format!("bad k range `{}'", s));
        }
        Ok(KRange { min, max, step })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "kestrel",
    version,
    about = "De novo genome assembler: reads to contigs via a de Bruijn graph",
    long_about = None
)]
pub struct Cli {
    /// K-mer size, or a range KMIN-KMAX:STEP to assemble iteratively
    #[arg(short, long = "kmer")]
    pub k: KRange,

    /// Remove contigs with mean k-mer coverage below this (derived from
    /// the coverage histogram when unset)
    #[arg(short, long)]
    pub coverage: Option<f32>,

    /// Minimum k-mer multiplicity; weaker k-mers are dropped before
    /// adjacency generation
    #[arg(long, default_value_t = 0)]
    pub kc: u16,

    /// Erode tip k-mers with multiplicity below this
    #[arg(short, long)]
    pub erode: Option<u16>,

    /// Erode single-strand tip k-mers with multiplicity below this
    #[arg(short = 'E', long)]
    pub erode_strand: Option<u16>,

    /// Maximum dead-end chain length to trim [k]
    #[arg(short = 't', long)]
    pub trim_len: Option<usize>,

    /// Maximum bubble branch length [3k]
    #[arg(short = 'b', long)]
    pub bubble_len: Option<usize>,

    /// Write the adjacency graph in DOT format to this file
    #[arg(short, long)]
    pub graph: Option<String>,

    /// Output contigs FASTA
    #[arg(short, long, default_value = "contigs.fa")]
    pub out: String,

    /// Spaced-seed mask over {0,1}, length k, symmetric
    #[arg(long)]
    pub mask: Option<String>,

    /// Expect strand-specific reads
    #[arg(long = "SS")]
    pub ss: bool,

    /// Pre-filter singleton k-mers through a Bloom filter of this many
    /// megabytes (0 disables)
    #[arg(long, default_value_t = 0)]
    pub bloom: usize,

    /// Worker threads
    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Record telemetry into this SQLite database
    #[arg(long)]
    pub db: Option<String>,

    /// Library name for telemetry
    #[arg(long)]
    pub library: Option<String>,

    /// Strain name for telemetry
    #[arg(long)]
    pub strain: Option<String>,

    /// Species name for telemetry
    #[arg(long)]
    pub species: Option<String>,

    /// Write the assembly summary as JSON to this file
    #[arg(long)]
    pub json_stats: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Input reads: FASTA, FASTQ or plain sequence-per-line, optionally
    /// gzipped
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_k_forms() {
        let single: KRange = "31".parse().unwrap();
        assert!(!single.is_range());
        assert_eq!(single.values().collect::<Vec<_>>(), vec![31]);

        let range: KRange = "25-45:10".parse().unwrap();
        assert_eq!(range.values().collect::<Vec<_>>(), vec![25, 35, 45]);

        let no_step: KRange = "3-5".parse().unwrap();
        assert_eq!(no_step.values().collect::<Vec<_>>(), vec![3, 4, 5]);

        assert!("45-25".parse::<KRange>().is_err());
        assert!("25-45:0".parse::<KRange>().is_err());
        assert!("x".parse::<KRange>().is_err());
    }
}
