// src/io/fasta.rs
//! Sequence readers and writers.
//!
//! Input may be FASTA, FASTQ or one bare sequence per line; the format is
//! sniffed from the first byte of each file. Gzip is detected by magic
//! bytes and decoded transparently. Records that cannot be parsed are
//! skipped and counted, not fatal; the caller promotes an empty load to an
//! error.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::graph::Contig;

/// One input sequence record.
#[derive(Debug, Clone)]
pub struct SeqRecord {
    pub id: String,
    pub sequence: String,
}

/// Open a file, decoding gzip when the magic bytes say so.
pub fn open_maybe_gz(path: &str) -> Result<Box<dyn BufRead + Send>> {
    let mut file = File::open(path).with_context(|| format!("opening `{}'", path))?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    // Re-read from the start; the magic bytes belong to the stream.
    let file = {
        let mut f = file;
        use std::io::Seek;
        f.seek(io::SeekFrom::Start(0))?;
        f
    };
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

enum Format {
    Fasta,
    Fastq,
    Plain,
}

/// Streaming reader over any supported sequence format.
pub struct SeqReader {
    lines: std::io::Lines<Box<dyn BufRead + Send>>,
    format: Format,
    /// Header line consumed while finishing the previous FASTA record.
    pending: Option<String>,
    /// Records dropped because they were malformed.
    pub skipped: usize,
}

impl SeqReader {
    pub fn open(path: &str) -> Result<SeqReader> {
        let mut reader = open_maybe_gz(path)?;
        let mut first = [0u8; 1];
        let format = match reader.read(&mut first)? {
            0 => Format::Plain,
            _ => match first[0] {
                b'>' => Format::Fasta,
                b'@' => Format::Fastq,
                _ => Format::Plain,
            },
        };
        // The sniffed byte is part of the first line; reopen.
        let reader = open_maybe_gz(path)?;
        Ok(SeqReader { lines: reader.lines(), format, pending: None, skipped: 0 })
    }

    fn next_fasta(&mut self) -> Option<io::Result<SeqRecord>> {
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                match self.lines.next()? {
                    Ok(line) if line.starts_with('>') => break line,
                    Ok(_) => self.skipped += 1, // sequence outside a record
                    Err(e) => return Some(Err(e)),
                }
            },
        };
        let id = header[1..].split_whitespace().next().unwrap_or("").to_string();
        let mut sequence = String::new();
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.starts_with('>') {
                        self.pending = Some(line);
                        break;
                    }
                    sequence.push_str(line.trim());
                }
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        Some(Ok(SeqRecord { id, sequence }))
    }

    fn next_fastq(&mut self) -> Option<io::Result<SeqRecord>> {
        loop {
            let header = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let sequence = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.skipped += 1;
                    return None;
                }
            };
            // Separator and quality lines.
            let plus = self.lines.next();
            let qual = self.lines.next();
            if plus.is_none() || qual.is_none() || !header.starts_with('@') {
                self.skipped += 1;
                return None;
            }
            if let Some(Err(e)) = plus {
                return Some(Err(e));
            }
            if let Some(Err(e)) = qual {
                return Some(Err(e));
            }
            let id = header[1..].split_whitespace().next().unwrap_or("").to_string();
            return Some(Ok(SeqRecord { id, sequence }));
        }
    }

    fn next_plain(&mut self) -> Option<io::Result<SeqRecord>> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    return Some(Ok(SeqRecord { id: String::new(), sequence: line.to_string() }));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Iterator for SeqReader {
    type Item = io::Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.format {
            Format::Fasta => self.next_fasta(),
            Format::Fastq => self.next_fastq(),
            Format::Plain => self.next_plain(),
        }
    }
}

/// Contig FASTA writer; gzip-compresses when the path ends in `.gz`.
pub enum FastaWriter {
    Plain(BufWriter<File>),
    Compressed(BufWriter<GzEncoder<File>>),
}

impl FastaWriter {
    pub fn create(path: &str) -> Result<FastaWriter> {
        let file = File::create(path).with_context(|| format!("creating `{}'", path))?;
        if Path::new(path).extension().map_or(false, |e| e == "gz") {
            let encoder = GzEncoder::new(file, Compression::default());
            Ok(FastaWriter::Compressed(BufWriter::new(encoder)))
        } else {
            Ok(FastaWriter::Plain(BufWriter::new(file)))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            FastaWriter::Plain(w) => w,
            FastaWriter::Compressed(w) => w,
        }
    }

    /// Header format: `>ID LEN MEANCOV`.
    pub fn write_contig(&mut self, contig: &Contig) -> io::Result<()> {
        let w = self.writer();
        writeln!(w, ">{} {} {:.1}", contig.id, contig.len(), contig.mean_coverage)?;
        writeln!(w, "{}", contig.sequence)
    }

    pub fn write_record(&mut self, header: &str, sequence: &str) -> io::Result<()> {
        let w = self.writer();
        writeln!(w, ">{}", header)?;
        writeln!(w, "{}", sequence)
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.writer().flush()
    }
}

/// Read contig ids and lengths from a FASTA file (scaffolder input).
pub fn read_contig_lengths(path: &str) -> Result<Vec<(String, u32)>> {
    let mut out = Vec::new();
    let reader = SeqReader::open(path)?;
    for record in reader {
        let record = record?;
        out.push((record.id, record.sequence.len() as u32));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_fasta() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, ">r1 extra words\nACGT\nACGT\n>r2\nTTTT").unwrap();
        let records: Vec<SeqRecord> =
            SeqReader::open(f.path().to_str().unwrap()).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].sequence, "ACGTACGT");
        assert_eq!(records[1].sequence, "TTTT");
    }

    #[test]
    fn reads_fastq() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "@r1\nACGTA\n+\nIIIII\n@r2\nGGGGG\n+\nIIIII").unwrap();
        let records: Vec<SeqRecord> =
            SeqReader::open(f.path().to_str().unwrap()).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sequence, "GGGGG");
    }

    #[test]
    fn reads_plain_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "ACGTACGT\n\nTTTTACGT").unwrap();
        let records: Vec<SeqRecord> =
            SeqReader::open(f.path().to_str().unwrap()).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn contig_header_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contigs.fa");
        let mut w = FastaWriter::create(path.to_str().unwrap()).unwrap();
        let contig = Contig {
            id: 0,
            sequence: "ACGTACGT".to_string(),
            mean_coverage: 3.25,
            kmers: 4,
        };
        w.write_contig(&contig).unwrap();
        w.finish().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">0 8 3.2\nACGTACGT\n");
    }
}
