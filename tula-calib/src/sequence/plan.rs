//! Sweep plan document
//!
//! JSON schema:
//!
//! ```json
//! {
//!   "sequence": [
//!     { "theta": 10, "psi_positions": [0, 90, 180] },
//!     { "theta": -30 }
//!   ]
//! }
//! ```
//!
//! A step without `psi_positions` (or with an empty list) is a single-sample
//! step at the current psi.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One primary-axis position and its secondary sweep
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Step {
    pub theta: f64,
    #[serde(default)]
    pub psi_positions: Vec<f64>,
}

impl Step {
    pub fn new(theta: f64, psi_positions: Vec<f64>) -> Self {
        Self {
            theta,
            psi_positions,
        }
    }
}

/// Ordered list of steps, read-only once loaded
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SequencePlan {
    pub sequence: Vec<Step>,
}

impl SequencePlan {
    pub fn new(sequence: Vec<Step>) -> Self {
        Self { sequence }
    }

    /// Load and validate a plan file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let plan = Self::from_json(&contents)?;
        log::info!(
            "Loaded plan {}: {} steps, {} psi points",
            path.display(),
            plan.sequence.len(),
            plan.total_points()
        );
        Ok(plan)
    }

    /// Parse and validate a plan document
    pub fn from_json(contents: &str) -> Result<Self> {
        let plan: SequencePlan = serde_json::from_str(contents)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Write the plan as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Every angle must be finite
    pub fn validate(&self) -> Result<()> {
        for (i, step) in self.sequence.iter().enumerate() {
            if !step.theta.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "step {}: theta is not finite",
                    i
                )));
            }
            if let Some(psi) = step.psi_positions.iter().find(|p| !p.is_finite()) {
                return Err(Error::InvalidParameter(format!(
                    "step {}: psi position {} is not finite",
                    i, psi
                )));
            }
        }
        Ok(())
    }

    /// Sum of psi targets over all steps
    ///
    /// Used to normalize progress; single-sample steps do not count.
    pub fn total_points(&self) -> usize {
        self.sequence.iter().map(|s| s.psi_positions.len()).sum()
    }
}
