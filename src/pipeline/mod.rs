//! Assembly pipeline drivers.

pub mod assemble;

pub use assemble::{assemble_reads, AssembleOptions};
