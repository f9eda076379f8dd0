//! Sequence Runner: top-level scan orchestration
//!
//! ```text
//! psi → reference
//! for step in plan:
//!     theta → step.theta (clamped)         abort run on failure
//!     no psi targets  → one direct capture
//!     otherwise       → SweepSequencer
//! completed → progress 100, optional return home
//! rows collected → scan_<start>.csv
//! ```
//!
//! Cancellation and failed moves end the scan early; whatever rows were
//! collected are still persisted.

use super::dataset::Dataset;
use super::plan::SequencePlan;
use super::sweep::SweepSequencer;
use crate::attitude::AttitudeEstimator;
use crate::config::{AppConfig, ControlConfig, SequenceConfig};
use crate::core::state::{RunControl, SharedAttitude};
use crate::core::types::{Axis, ControlTarget};
use crate::error::Result;
use crate::motion::{Actuator, PositionController};
use crate::sampling::{SampleOutcome, Sampler};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;

/// Summary of one scan
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Rows collected (and persisted, when non-zero)
    pub rows: usize,
    /// Written artifact, `None` when no rows were collected
    pub artifact: Option<PathBuf>,
    /// Every step finished without failure or cancellation
    pub completed: bool,
}

/// Drives a full plan against one actuator
pub struct SequenceRunner<A: Actuator> {
    control: ControlConfig,
    sequence: SequenceConfig,
    run: Arc<RunControl>,
    actuator: A,
    controller: PositionController,
    sampler: Sampler,
}

impl<A: Actuator> SequenceRunner<A> {
    pub fn new(
        config: &AppConfig,
        attitude: Arc<SharedAttitude>,
        run: Arc<RunControl>,
        actuator: A,
    ) -> Self {
        let controller =
            PositionController::new(&config.control, Arc::clone(&attitude), Arc::clone(&run));
        let sampler = Sampler::new(
            &config.sampling,
            AttitudeEstimator::new(config.sensor.sensitivity),
            attitude,
            Arc::clone(&run),
        );
        Self {
            control: config.control.clone(),
            sequence: config.sequence.clone(),
            run,
            actuator,
            controller,
            sampler,
        }
    }

    /// Give the actuator back, e.g. to send a final stop
    pub fn into_actuator(self) -> A {
        self.actuator
    }

    /// Execute `plan`, reporting progress (0..=100) through `progress`
    ///
    /// Move failures and cancellation are reported through
    /// [`RunReport::completed`]; only persistence errors are returned as `Err`.
    pub fn run(&mut self, plan: &SequencePlan, progress: &mut dyn FnMut(u8)) -> Result<RunReport> {
        let started = Local::now();
        let total = plan.total_points();
        let mut done = 0usize;
        let mut dataset = Dataset::new();

        log::info!(
            "Starting scan: {} steps, {} psi points, {:?} sampling",
            plan.sequence.len(),
            total,
            self.sampler.mode()
        );
        self.run.set_progress(0);

        let completed = self.execute(plan, &mut dataset, &mut |run: &RunControl| {
            done += 1;
            let percent = (done * 100 / total.max(1)).min(100) as u8;
            run.set_progress(percent);
            progress(percent);
        });

        if completed {
            self.run.set_progress(100);
            progress(100);
            log::info!("Scan complete: {} rows", dataset.len());
            if self.sequence.return_home && !self.home() {
                log::warn!("Return to home failed");
            }
        } else if !self.run.is_running() {
            log::warn!("Scan cancelled: {} rows collected", dataset.len());
        } else {
            log::error!("Scan aborted: {} rows collected", dataset.len());
        }

        let artifact = if dataset.is_empty() {
            log::warn!("No rows collected, nothing saved");
            None
        } else {
            Some(dataset.persist(&self.sequence.output_dir, started)?)
        };

        Ok(RunReport {
            rows: dataset.len(),
            artifact,
            completed,
        })
    }

    fn execute(
        &mut self,
        plan: &SequencePlan,
        dataset: &mut Dataset,
        on_point: &mut dyn FnMut(&RunControl),
    ) -> bool {
        if !self.move_axis(Axis::Psi, self.sequence.psi_reference_deg) {
            log::error!("Failed to reach psi reference");
            return false;
        }

        let sweep = SweepSequencer::new(&self.control, &self.controller, &self.sampler, &self.run);
        let (theta_min, theta_max) = self.control.theta_bounds();

        for (i, step) in plan.sequence.iter().enumerate() {
            if !self.run.is_running() {
                return false;
            }

            let theta_cmd = crate::attitude::clamp(step.theta, theta_min, theta_max);
            log::info!(
                "Step {}/{}: theta {:+.1}°, {} psi positions",
                i + 1,
                plan.sequence.len(),
                theta_cmd,
                step.psi_positions.len()
            );

            let target = ControlTarget::new(
                Axis::Theta,
                theta_cmd,
                self.control.theta_bounds(),
                self.control.theta_motor,
            );
            if !self
                .controller
                .move_to(&mut self.actuator, &target)
                .is_reached()
            {
                return false;
            }

            let ok = if step.psi_positions.is_empty() {
                self.sampler.capture(theta_cmd, dataset) == SampleOutcome::Complete
            } else {
                let run: &RunControl = &self.run;
                sweep.sweep(
                    &mut self.actuator,
                    theta_cmd,
                    &step.psi_positions,
                    dataset,
                    &mut || on_point(run),
                )
            };
            if !ok {
                return false;
            }
        }

        self.run.is_running()
    }

    /// Drive psi to 0° then theta to 0°
    pub fn home(&mut self) -> bool {
        log::info!("Homing bench");
        self.move_axis(Axis::Psi, 0.0) && self.move_axis(Axis::Theta, 0.0)
    }

    fn move_axis(&mut self, axis: Axis, target_deg: f64) -> bool {
        let (bounds, motor_id) = match axis {
            Axis::Theta => (self.control.theta_bounds(), self.control.theta_motor),
            Axis::Psi => (self.control.psi_bounds(), self.control.psi_motor),
        };
        let target = ControlTarget::new(axis, target_deg, bounds, motor_id);
        self.controller
            .move_to(&mut self.actuator, &target)
            .is_reached()
    }
}
