//! TulaCalib - Closed-loop controller for a two-axis accelerometer calibration bench
//!
//! Orients a device under test to commanded (theta, psi) angles using live
//! accelerometer feedback, captures samples at each position and writes the
//! resulting dataset to CSV.
//!
//! ## Data flow
//!
//! ```text
//! accelerometer ─▶ ingest::AccelReader ─▶ core::SharedAttitude ─┬─▶ motion::PositionController ─▶ motors
//!   (TCP / sim)        (own thread)          (latest sample)    └─▶ sampling::Sampler ─▶ sequence::Dataset ─▶ scan_*.csv
//! ```
//!
//! Everything below [`sequence::SequenceRunner`] runs on the caller's thread;
//! only the ingestion loop (and the simulated bench) run concurrently.
//! [`core::RunControl`] carries pause/resume/cancel to every loop.

pub mod attitude;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod ingest;
pub mod motion;
pub mod sampling;
pub mod sequence;
pub mod transport;

// Re-export commonly used types
pub use attitude::AttitudeEstimator;
pub use config::AppConfig;
pub use crate::core::{RunControl, SharedAttitude};
pub use error::{Error, Result};
pub use sampling::{Sampler, SamplingMode};
pub use sequence::{RunReport, SequencePlan, SequenceRunner};
