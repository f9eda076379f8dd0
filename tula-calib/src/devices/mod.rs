//! Device implementations
//!
//! The physical bench is reached through [`crate::transport`]; this module
//! holds the hardware-free simulated bench.

pub mod sim;

pub use sim::{BenchPose, SimulatedBench};
