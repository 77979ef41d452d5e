// src/stats.rs
//! Length histograms and contiguity statistics.
//!
//! Shared by the assembler's summary output and the scaffolder's parameter
//! search, which maximizes scaffold N50 over these histograms.

use serde::Serialize;

/// A multiset of sequence lengths.
#[derive(Debug, Clone, Default)]
pub struct LengthHistogram {
    lengths: Vec<u64>,
    sorted: bool,
}

impl LengthHistogram {
    pub fn new() -> LengthHistogram {
        LengthHistogram::default()
    }

    pub fn insert(&mut self, length: u64) {
        self.lengths.push(length);
        self.sorted = false;
    }

    fn sort(&mut self) {
        if !self.sorted {
            self.lengths.sort_unstable();
            self.sorted = true;
        }
    }

    pub fn count(&self) -> usize {
        self.lengths.len()
    }

    pub fn count_at_least(&self, min: u64) -> usize {
        self.lengths.iter().filter(|&&l| l >= min).count()
    }

    pub fn sum(&self) -> u64 {
        self.lengths.iter().sum()
    }

    pub fn min(&self) -> u64 {
        self.lengths.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> u64 {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Keep only lengths >= min.
    pub fn trim_low(&self, min: u64) -> LengthHistogram {
        LengthHistogram {
            lengths: self.lengths.iter().copied().filter(|&l| l >= min).collect(),
            sorted: false,
        }
    }

    /// The smallest length L such that sequences of length >= L cover at
    /// least `fraction` of `target` bases. N50 is (0.5, total sum); NG50
    /// passes the genome size as target.
    fn nx(&mut self, fraction: f64, target: u64) -> u64 {
        self.sort();
        let want = (target as f64 * fraction).ceil() as u64;
        let mut acc = 0u64;
        for &len in self.lengths.iter().rev() {
            acc += len;
            if acc >= want {
                return len;
            }
        }
        0
    }

    pub fn n50(&mut self) -> u64 {
        let total = self.sum();
        self.nx(0.5, total)
    }

    pub fn n75(&mut self) -> u64 {
        let total = self.sum();
        self.nx(0.75, total)
    }

    pub fn n25(&mut self) -> u64 {
        let total = self.sum();
        self.nx(0.25, total)
    }

    /// NG50: N50 against an expected genome size instead of the assembly
    /// total.
    pub fn ng50(&mut self, genome_size: u64) -> u64 {
        self.nx(0.5, genome_size)
    }

    /// Number of sequences making up the N50 ("L50").
    pub fn l50(&mut self) -> usize {
        self.sort();
        let want = (self.sum() + 1) / 2;
        let mut acc = 0u64;
        for (i, &len) in self.lengths.iter().rev().enumerate() {
            acc += len;
            if acc >= want {
                return i + 1;
            }
        }
        0
    }

    /// Expected size of the sequence containing a uniformly random base.
    pub fn e_size(&self) -> f64 {
        let total = self.sum();
        if total == 0 {
            return 0.0;
        }
        let sq: f64 = self.lengths.iter().map(|&l| (l as f64) * (l as f64)).sum();
        sq / total as f64
    }
}

/// One row of the contiguity table the scaffolder prints per parameter
/// point, in the order: n, n >= min, L50, min, N75, N50, N25, E-size, max,
/// sum (and NG50 when a genome size is known).
pub fn contiguity_row(
    h: &LengthHistogram,
    min_len: u64,
    genome_size: Option<u64>,
    label: &str,
) -> String {
    let mut t = h.trim_low(min_len);
    let mut row = format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.0}\t{}\t{}",
        h.count(),
        t.count(),
        t.l50(),
        t.min(),
        t.n75(),
        t.n50(),
        t.n25(),
        t.e_size(),
        t.max(),
        t.sum(),
    );
    if let Some(gs) = genome_size {
        row.push_str(&format!("\t{}", t.ng50(gs)));
    }
    row.push('\t');
    row.push_str(label);
    row
}

pub fn contiguity_header(genome_size: Option<u64>) -> String {
    let mut h = "n\tn:min\tL50\tmin\tN75\tN50\tN25\tEsize\tmax\tsum".to_string();
    if genome_size.is_some() {
        h.push_str("\tNG50");
    }
    h
}

/// Assembly summary, serializable for `--json-stats`.
#[derive(Debug, Serialize)]
pub struct AssemblyStats {
    pub contigs: usize,
    pub total_length: u64,
    pub mean_length: f64,
    pub n50: u64,
    pub max_length: u64,
    pub kmers_assembled: usize,
    pub kmers_removed: usize,
    pub snr_db: f64,
}

impl AssemblyStats {
    pub fn from_contigs(
        lengths: impl IntoIterator<Item = u64>,
        kmers_assembled: usize,
        kmers_removed: usize,
    ) -> AssemblyStats {
        let mut h = LengthHistogram::new();
        for len in lengths {
            h.insert(len);
        }
        let total = h.sum();
        let count = h.count();
        AssemblyStats {
            contigs: count,
            total_length: total,
            mean_length: if count > 0 { total as f64 / count as f64 } else { 0.0 },
            n50: h.n50(),
            max_length: h.max(),
            kmers_assembled,
            kmers_removed,
            snr_db: snr(kmers_assembled, kmers_removed),
        }
    }
}

/// Signal-to-noise ratio of the assembly, in dB.
pub fn snr(kept: usize, removed: usize) -> f64 {
    if removed == 0 || kept == 0 {
        return f64::INFINITY;
    }
    10.0 * (kept as f64 / removed as f64).log10()
}
