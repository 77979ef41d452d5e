//! Kestrel: a de novo genome assembler.
//!
//! The crate is organized around four layers: a packed k-mer core
//! (`kmer`), the hashed de Bruijn graph store and its cleaning passes
//! (`graph`), the assembly pipeline (`pipeline`), and the scaffolder over
//! distance-estimate graphs (`scaffold`).

pub mod cli_main;
pub mod graph;
pub mod io;
pub mod kmer;
pub mod pipeline;
pub mod scaffold;
pub mod stats;
pub mod telemetry;
