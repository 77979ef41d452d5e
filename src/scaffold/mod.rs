//! Scaffolder: distance-estimate graph cleanup, path assembly and the
//! N50-maximizing parameter search.

pub mod cleanup;
pub mod graph;
pub mod paths;
pub mod search;

pub use graph::{ContigNode, DistanceEst, ScaffoldGraph};
pub use paths::PathStep;
pub use search::{ScaffoldOptions, ScaffoldResult};
