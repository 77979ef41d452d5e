//! File formats: sequence records in and out, DOT graphs.

pub mod dot;
pub mod fasta;
