//! Closed-loop positioning controller
//!
//! Drives one bench axis toward a target angle using the latest attitude
//! estimate as feedback. Each control period:
//!
//! 1. Cancelled → stop all motors, [`MoveOutcome::Cancelled`]
//! 2. Paused → stop all motors, block until resumed; the paused time is
//!    added to the move start so the timeout only counts active time
//! 3. No attitude yet → wait one period (also excluded from the timeout)
//! 4. `|error| < stop_threshold` → stop all motors, [`MoveOutcome::Reached`]
//! 5. Send `?m<id>=<speed>` from the [`SpeedLaw`]
//! 6. Active time > timeout → stop all motors, [`MoveOutcome::TimedOut`]

use super::commands::{Actuator, MotorCommand};
use super::constraints::SpeedLaw;
use crate::attitude::{normalize_angle, shortest_angle_error};
use crate::config::ControlConfig;
use crate::core::state::{AttitudeSource, RunControl, SharedAttitude};
use crate::core::types::{ControlTarget, MoveOutcome};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Iterations between "still moving" debug logs
const PROGRESS_LOG_EVERY: u64 = 20;

/// Proportional single-axis positioning controller
pub struct PositionController<S: AttitudeSource + ?Sized = SharedAttitude> {
    law: SpeedLaw,
    stop_threshold: f64,
    period: Duration,
    timeout: Duration,
    source: Arc<S>,
    run: Arc<RunControl>,
}

impl<S: AttitudeSource + ?Sized> PositionController<S> {
    pub fn new(config: &ControlConfig, source: Arc<S>, run: Arc<RunControl>) -> Self {
        log::debug!(
            "PositionController: kp={:.2}, speed=[{:.0}, {:.0}], threshold={:.2}°, period={}ms, timeout={:.1}s",
            config.kp,
            config.min_speed,
            config.max_speed,
            config.stop_threshold_deg,
            config.period_ms,
            config.timeout_s
        );
        Self {
            law: SpeedLaw::from_config(config),
            stop_threshold: config.stop_threshold_deg,
            period: config.period(),
            timeout: config.timeout(),
            source,
            run,
        }
    }

    /// Drive `target.axis` until reached, timed out or cancelled
    pub fn move_to<A: Actuator + ?Sized>(
        &self,
        actuator: &mut A,
        target: &ControlTarget,
    ) -> MoveOutcome {
        let axis = target.axis;
        let goal = target.clamped_target();
        if goal != target.target_deg {
            log::warn!(
                "{} target {:+.1}° clamped to {:+.1}°",
                axis,
                target.target_deg,
                goal
            );
        }
        log::info!("{} -> {:+.1}°", axis, goal);

        let mut start = Instant::now();
        let mut iterations: u64 = 0;
        let mut waiting_logged = false;

        loop {
            if !self.run.is_running() {
                halt(actuator);
                log::warn!("{}: cancelled after {} iterations", axis, iterations);
                return MoveOutcome::Cancelled;
            }

            if self.run.is_paused() {
                halt(actuator);
                log::info!("{}: paused", axis);
                let paused_for = self.run.wait_while_paused();
                start += paused_for;
                log::info!("{}: resumed after {:.1}s", axis, paused_for.as_secs_f64());
                continue;
            }

            iterations += 1;

            let Some(current) = self.source.angle(axis) else {
                if !waiting_logged {
                    log::warn!("{}: no attitude data yet, waiting", axis);
                    waiting_logged = true;
                }
                let waited = Instant::now();
                thread::sleep(self.period);
                start += waited.elapsed();
                continue;
            };

            let current = normalize_angle(current);
            let error = shortest_angle_error(goal, current);

            if iterations % PROGRESS_LOG_EVERY == 0 {
                log::debug!(
                    "{}: iteration {}, current={:+.2}°, error={:+.2}°",
                    axis,
                    iterations,
                    current,
                    error
                );
            }

            if error.abs() < self.stop_threshold {
                halt(actuator);
                log::info!(
                    "{} reached {:+.2}° after {} iterations",
                    axis,
                    current,
                    iterations
                );
                return MoveOutcome::Reached;
            }

            let speed = self.law.command(error);
            let cmd = MotorCommand::SetSpeed {
                motor_id: target.motor_id,
                speed,
            };
            if let Err(e) = actuator.send(cmd) {
                log::warn!("{}: failed to send {}: {}", axis, cmd, e);
            }

            if start.elapsed() > self.timeout {
                halt(actuator);
                log::error!(
                    "{}: timeout after {} iterations (error {:+.2}°)",
                    axis,
                    iterations,
                    error
                );
                return MoveOutcome::TimedOut;
            }

            thread::sleep(self.period);
        }
    }
}

fn halt<A: Actuator + ?Sized>(actuator: &mut A) {
    if let Err(e) = actuator.stop_all() {
        log::error!("Failed to send stop-all: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Axis;
    use crate::error::Result;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingActuator {
        sent: Vec<MotorCommand>,
    }

    impl RecordingActuator {
        fn stop_count(&self) -> usize {
            self.sent
                .iter()
                .filter(|c| **c == MotorCommand::StopAll)
                .count()
        }

        fn speeds(&self) -> Vec<i32> {
            self.sent
                .iter()
                .filter_map(|c| match c {
                    MotorCommand::SetSpeed { speed, .. } => Some(*speed),
                    MotorCommand::StopAll => None,
                })
                .collect()
        }
    }

    impl Actuator for RecordingActuator {
        fn send(&mut self, cmd: MotorCommand) -> Result<()> {
            self.sent.push(cmd);
            Ok(())
        }
    }

    /// Returns the current angle, then steps it toward `target`
    struct ConvergingFeed {
        angle: Mutex<Option<f64>>,
        target: f64,
        step: f64,
    }

    impl AttitudeSource for ConvergingFeed {
        fn angle(&self, _axis: Axis) -> Option<f64> {
            let mut angle = self.angle.lock();
            let current = (*angle)?;
            let remaining = self.target - current;
            *angle = Some(current + remaining.clamp(-self.step, self.step));
            Some(current)
        }
    }

    fn fixed(angle: Option<f64>) -> Arc<ConvergingFeed> {
        Arc::new(ConvergingFeed {
            angle: Mutex::new(angle),
            target: 0.0,
            step: 0.0,
        })
    }

    fn test_config() -> ControlConfig {
        ControlConfig {
            period_ms: 2,
            timeout_s: 0.15,
            ..ControlConfig::default()
        }
    }

    #[test]
    fn test_reaches_converging_target() {
        let feed = Arc::new(ConvergingFeed {
            angle: Mutex::new(Some(0.0)),
            target: 10.0,
            step: 2.0,
        });
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(&test_config(), feed, run);
        let mut actuator = RecordingActuator::default();

        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Theta, 10.0, (-85.0, 85.0), 1),
        );

        assert_eq!(outcome, MoveOutcome::Reached);
        // Reads 0, 2, 4, 6, 8 command motion; the read of 10 stops
        assert_eq!(actuator.speeds(), vec![25, 20, 15, 15, 15]);
        assert_eq!(actuator.stop_count(), 1);
        assert_eq!(actuator.sent.last(), Some(&MotorCommand::StopAll));
    }

    #[test]
    fn test_times_out_without_convergence() {
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(&test_config(), fixed(Some(0.0)), run);
        let mut actuator = RecordingActuator::default();

        let started = Instant::now();
        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Psi, 90.0, (-179.0, 179.0), 2),
        );
        let elapsed = started.elapsed();

        assert_eq!(outcome, MoveOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(actuator.stop_count(), 1);
        assert!(actuator.speeds().iter().all(|&s| s == 30));
    }

    #[test]
    fn test_pause_excluded_from_timeout() {
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(&test_config(), fixed(Some(0.0)), Arc::clone(&run));

        let operator = Arc::clone(&run);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            operator.pause();
            thread::sleep(Duration::from_millis(200));
            operator.resume();
        });

        let mut actuator = RecordingActuator::default();
        let started = Instant::now();
        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Psi, 90.0, (-179.0, 179.0), 2),
        );
        let elapsed = started.elapsed();
        handle.join().unwrap();

        assert_eq!(outcome, MoveOutcome::TimedOut);
        // 150ms active + ~200ms paused
        assert!(elapsed >= Duration::from_millis(320), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3));
        // One stop entering pause, one at timeout
        assert_eq!(actuator.stop_count(), 2);
    }

    #[test]
    fn test_cancel_stops_motor() {
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(
            &ControlConfig {
                period_ms: 5,
                timeout_s: 30.0,
                ..ControlConfig::default()
            },
            fixed(Some(0.0)),
            Arc::clone(&run),
        );

        let operator = Arc::clone(&run);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            operator.cancel();
        });

        let mut actuator = RecordingActuator::default();
        let started = Instant::now();
        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Theta, 45.0, (-85.0, 85.0), 1),
        );
        handle.join().unwrap();

        assert_eq!(outcome, MoveOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(actuator.sent.last(), Some(&MotorCommand::StopAll));
        assert_eq!(actuator.stop_count(), 1);
    }

    #[test]
    fn test_missing_data_waits() {
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(&test_config(), fixed(None), Arc::clone(&run));

        let operator = Arc::clone(&run);
        let handle = thread::spawn(move || {
            // Longer than the timeout: waiting for data must not time out
            thread::sleep(Duration::from_millis(300));
            operator.cancel();
        });

        let mut actuator = RecordingActuator::default();
        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Theta, 10.0, (-85.0, 85.0), 1),
        );
        handle.join().unwrap();

        assert_eq!(outcome, MoveOutcome::Cancelled);
        assert!(actuator.speeds().is_empty());
    }

    #[test]
    fn test_target_clamped_and_shortest_path() {
        // Current -175°, requested 200° is clamped to 179°: shortest path is
        // 6° backward through the ±180 seam.
        let run = Arc::new(RunControl::new());
        let controller = PositionController::new(
            &ControlConfig {
                min_speed: 1.0,
                ..test_config()
            },
            fixed(Some(-175.0)),
            run,
        );
        let mut actuator = RecordingActuator::default();

        let outcome = controller.move_to(
            &mut actuator,
            &ControlTarget::new(Axis::Psi, 200.0, (-179.0, 179.0), 2),
        );

        assert_eq!(outcome, MoveOutcome::TimedOut);
        let speeds = actuator.speeds();
        assert_eq!(speeds[0], -15);
        assert!(
            actuator
                .sent
                .iter()
                .all(|c| !matches!(c, MotorCommand::SetSpeed { motor_id, .. } if *motor_id != 2))
        );
    }
}
