//! Test utilities for sequence-level tests.
//!
//! Provides an instantly converging bench: the actuator moves the true angles
//! by the full commanded step and republishes them, while a feeder thread keeps
//! producing fresh samples for the sampling engine.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tula_calib::attitude::{AttitudeEstimator, normalize_angle};
use tula_calib::config::AppConfig;
use tula_calib::error::Result;
use tula_calib::motion::{Actuator, MotorCommand};
use tula_calib::sampling::SamplingMode;
use tula_calib::SharedAttitude;

pub const THETA_MOTOR: u8 = 1;
pub const PSI_MOTOR: u8 = 2;

/// Fast configuration writing artifacts into `output_dir`
///
/// `min_speed = 1` and a wide speed clamp make every commanded step land
/// within the stop threshold.
pub fn test_config(output_dir: &Path, mode: SamplingMode, samples: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.control.period_ms = 5;
    config.control.timeout_s = 2.0;
    config.control.settle_ms = 1;
    config.control.min_speed = 1.0;
    config.control.max_speed = 1000.0;
    config.sampling.mode = mode;
    config.sampling.samples = samples;
    config.sampling.poll_ms = 5;
    config.sequence.output_dir = output_dir.to_path_buf();
    config
}

/// True bench angles plus the feeder publishing them
pub struct TestBench {
    pose: Arc<Mutex<(f64, f64)>>,
    shared: Arc<SharedAttitude>,
    stop: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl TestBench {
    pub fn start(theta: f64, psi: f64) -> Self {
        let pose = Arc::new(Mutex::new((theta, psi)));
        let shared = Arc::new(SharedAttitude::new());
        let stop = Arc::new(AtomicBool::new(false));

        let feeder = {
            let pose = Arc::clone(&pose);
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    {
                        // Held across publish: a concurrent move publishes last
                        let pose = pose.lock();
                        publish(&shared, pose.0, pose.1);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        Self {
            pose,
            shared,
            stop,
            feeder: Some(feeder),
        }
    }

    pub fn shared(&self) -> Arc<SharedAttitude> {
        Arc::clone(&self.shared)
    }

    pub fn pose(&self) -> (f64, f64) {
        *self.pose.lock()
    }

    /// Actuator that jumps by `speed / kp` degrees per command
    pub fn actuator(&self, kp: f64) -> InstantActuator {
        InstantActuator {
            kp,
            pose: Arc::clone(&self.pose),
            shared: Arc::clone(&self.shared),
            sent: Arc::new(Mutex::new(Vec::new())),
            dead_motor: None,
        }
    }
}

impl Drop for TestBench {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.feeder.take() {
            let _ = handle.join();
        }
    }
}

fn publish(shared: &SharedAttitude, theta: f64, psi: f64) {
    let estimator = AttitudeEstimator::default();
    let raw = estimator.counts_for(theta, psi).map(|c| c.round() as i32);
    shared.publish(theta, psi, raw);
}

/// Moves the test bench immediately and records every command
pub struct InstantActuator {
    kp: f64,
    pose: Arc<Mutex<(f64, f64)>>,
    shared: Arc<SharedAttitude>,
    sent: Arc<Mutex<Vec<MotorCommand>>>,
    dead_motor: Option<u8>,
}

impl InstantActuator {
    /// Commands for `motor_id` are recorded but move nothing
    pub fn with_dead_motor(mut self, motor_id: u8) -> Self {
        self.dead_motor = Some(motor_id);
        self
    }

    /// Shared view of the command log
    pub fn log(&self) -> Arc<Mutex<Vec<MotorCommand>>> {
        Arc::clone(&self.sent)
    }
}

impl Actuator for InstantActuator {
    fn send(&mut self, cmd: MotorCommand) -> Result<()> {
        self.sent.lock().push(cmd);
        let MotorCommand::SetSpeed { motor_id, speed } = cmd else {
            return Ok(());
        };
        if self.dead_motor == Some(motor_id) {
            return Ok(());
        }

        let mut pose = self.pose.lock();
        let step = f64::from(speed) / self.kp;
        match motor_id {
            THETA_MOTOR => pose.0 = (pose.0 + step).clamp(-90.0, 90.0),
            PSI_MOTOR => pose.1 = normalize_angle(pose.1 + step),
            _ => {}
        }
        publish(&self.shared, pose.0, pose.1);
        Ok(())
    }
}

/// Count `?stopall` commands in a log
pub fn stop_count(log: &Mutex<Vec<MotorCommand>>) -> usize {
    log.lock()
        .iter()
        .filter(|c| **c == MotorCommand::StopAll)
        .count()
}
