//! Core abstractions shared by every bench component.
//!
//! - [`types`]: Samples, control targets, dataset rows and move outcomes
//! - [`state`]: [`state::SharedAttitude`] (latest sample slot) and
//!   [`state::RunControl`] (run/pause/progress flags)

pub mod state;
pub mod types;

pub use state::{RunControl, SharedAttitude};
pub use types::{AttitudeSample, Axis, ControlTarget, DatasetRow, MoveOutcome};
