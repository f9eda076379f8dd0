//! Core data types for attitude samples, control targets and dataset rows.
//!
//! Key types:
//! - [`AttitudeSample`]: One estimate published by the ingestion loop
//! - [`ControlTarget`]: Parameters of a single positioning move
//! - [`DatasetRow`]: One line of the persisted calibration dataset

use std::fmt;

/// Bench rotation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Primary axis, tilt about the sensor X direction
    Theta,
    /// Secondary axis, roll about the sensor X direction
    Psi,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::Theta => "Theta",
            Axis::Psi => "Psi",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest attitude estimate, immutable once published
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    /// Tilt in degrees, within [-90, 90]
    pub theta: f64,
    /// Roll in degrees, within (-180, 180]
    pub psi: f64,
    /// Raw accelerometer counts (x, y, z)
    pub raw: [i32; 3],
    /// Microseconds since the Unix epoch, strictly increasing per publisher
    pub timestamp_us: u64,
}

impl AttitudeSample {
    /// Angle of the requested axis
    #[inline]
    pub fn angle(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Theta => self.theta,
            Axis::Psi => self.psi,
        }
    }
}

/// One positioning move: drive `axis` to `target_deg` using `motor_id`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTarget {
    pub axis: Axis,
    pub target_deg: f64,
    /// Safety bounds `(min, max)` the target is clamped to
    pub bounds: (f64, f64),
    pub motor_id: u8,
}

impl ControlTarget {
    pub fn new(axis: Axis, target_deg: f64, bounds: (f64, f64), motor_id: u8) -> Self {
        Self {
            axis,
            target_deg,
            bounds,
            motor_id,
        }
    }

    /// Target after applying the safety bounds
    pub fn clamped_target(&self) -> f64 {
        crate::attitude::clamp(self.target_deg, self.bounds.0, self.bounds.1)
    }
}

/// Terminal state of a positioning move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Error dropped below the stop threshold
    Reached,
    /// Active time exceeded the move timeout
    TimedOut,
    /// Run was cancelled while moving
    Cancelled,
}

impl MoveOutcome {
    #[inline]
    pub fn is_reached(self) -> bool {
        self == MoveOutcome::Reached
    }
}

/// One measurement row
///
/// `x`, `y`, `z` hold raw counts in raw mode and mean counts in average mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetRow {
    pub timestamp_us: u64,
    pub theta_cmd: f64,
    pub theta: f64,
    pub psi: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Magnitude of (x, y, z) in g
    pub norm: f64,
}
