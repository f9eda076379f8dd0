//! Sweep Sequencer: visits the psi targets of one theta step
//!
//! For each target: position psi, wait for the mechanics to settle, capture
//! one measurement point, report it. The first failed move or a cancellation
//! ends the sweep.

use crate::config::ControlConfig;
use crate::core::state::{AttitudeSource, RunControl};
use crate::core::types::{Axis, ControlTarget, MoveOutcome};
use crate::motion::{Actuator, PositionController};
use crate::sampling::{SampleOutcome, Sampler};
use crate::sequence::dataset::Dataset;
use std::thread;
use std::time::Duration;

/// Psi sweep at a fixed commanded theta
pub struct SweepSequencer<'a, S: AttitudeSource + ?Sized> {
    controller: &'a PositionController<S>,
    sampler: &'a Sampler,
    run: &'a RunControl,
    psi_bounds: (f64, f64),
    psi_motor: u8,
    settle: Duration,
}

impl<'a, S: AttitudeSource + ?Sized> SweepSequencer<'a, S> {
    pub fn new(
        config: &ControlConfig,
        controller: &'a PositionController<S>,
        sampler: &'a Sampler,
        run: &'a RunControl,
    ) -> Self {
        Self {
            controller,
            sampler,
            run,
            psi_bounds: config.psi_bounds(),
            psi_motor: config.psi_motor,
            settle: config.settle(),
        }
    }

    /// Visit every target in order
    ///
    /// `on_point` is called after each captured point. Returns `true` only if
    /// every target was reached and sampled without cancellation.
    pub fn sweep<A: Actuator + ?Sized>(
        &self,
        actuator: &mut A,
        theta_cmd: f64,
        psi_targets: &[f64],
        dataset: &mut Dataset,
        on_point: &mut dyn FnMut(),
    ) -> bool {
        for (i, &psi) in psi_targets.iter().enumerate() {
            if !self.run.is_running() {
                log::warn!("Sweep cancelled before psi {:+.1}°", psi);
                return false;
            }

            let target = ControlTarget::new(Axis::Psi, psi, self.psi_bounds, self.psi_motor);
            match self.controller.move_to(actuator, &target) {
                MoveOutcome::Reached => {}
                outcome => {
                    log::error!(
                        "Sweep aborted at theta {:+.1}°, psi {:+.1}° ({:?})",
                        theta_cmd,
                        psi,
                        outcome
                    );
                    return false;
                }
            }

            self.run.wait_while_paused();
            thread::sleep(self.settle);

            if self.sampler.capture(theta_cmd, dataset) == SampleOutcome::Cancelled {
                return false;
            }
            log::debug!(
                "Point {}/{} at theta {:+.1}°, psi {:+.1}° captured",
                i + 1,
                psi_targets.len(),
                theta_cmd,
                psi
            );
            on_point();
        }
        true
    }
}
