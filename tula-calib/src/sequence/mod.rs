//! Scan sequencing: plan input, sweep and run orchestration, dataset output

pub mod dataset;
pub mod plan;
pub mod runner;
pub mod sweep;

pub use dataset::Dataset;
pub use plan::{SequencePlan, Step};
pub use runner::{RunReport, SequenceRunner};
pub use sweep::SweepSequencer;
