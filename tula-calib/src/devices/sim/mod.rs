//! Simulated two-axis calibration bench
//!
//! Hardware-free stand-in for the motor controller and the accelerometer
//! stream, used by `--simulate` and by integration tests.
//!
//! # Thread Model
//!
//! ```text
//!  MotorPort ──MotorCommand──▶ ┌────────────────┐ ──ASC3 lines──▶ AccelStream
//!  (write side)    channel     │ bench-sim loop │     channel     (read side)
//!                              └────────────────┘
//! ```
//!
//! Every tick (`1 / rate_hz`):
//! 1. Apply pending motor commands (`?mN=S` sets one axis speed, `?stopall`
//!    zeroes both)
//! 2. Integrate `speed * deg_per_speed_unit` into the true angles; theta is
//!    mechanically limited to ±90°, psi wraps
//! 3. Synthesize counts for the true angles plus Gaussian noise
//! 4. Emit `ASC3 <n> <x> <y> <z>\n`
//!
//! The loop exits when the bench is dropped or the accelerometer side is
//! closed.

mod noise;

use crate::attitude::{AttitudeEstimator, normalize_angle};
use crate::config::{ControlConfig, SensorConfig, SimulationConfig};
use crate::error::{Error, Result};
use crate::ingest::framing::LineFramer;
use crate::motion::MotorCommand;
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use noise::NoiseGenerator;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Mechanical theta stop
const THETA_LIMIT: f64 = 90.0;

/// True bench state, shared with the simulation thread
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BenchPose {
    pub theta: f64,
    pub psi: f64,
    pub theta_speed: i32,
    pub psi_speed: i32,
}

struct SimShared {
    pose: Mutex<BenchPose>,
    shutdown: AtomicBool,
}

/// Handle owning the simulation thread; dropping it stops the thread
pub struct SimulatedBench {
    shared: Arc<SimShared>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedBench {
    /// Start the simulation thread
    ///
    /// Returns the bench handle, the accelerometer stream to hand to the
    /// ingestion loop, and the motor port to hand to the actuator.
    pub fn spawn(
        sim: &SimulationConfig,
        sensor: &SensorConfig,
        control: &ControlConfig,
        read_timeout: Duration,
    ) -> Result<(Self, AccelStream, MotorPort)> {
        if !(sim.rate_hz.is_finite() && sim.rate_hz > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "simulation rate must be positive, got {}",
                sim.rate_hz
            )));
        }

        let shared = Arc::new(SimShared {
            pose: Mutex::new(BenchPose {
                theta: sim.start_theta_deg.clamp(-THETA_LIMIT, THETA_LIMIT),
                psi: normalize_angle(sim.start_psi_deg),
                ..BenchPose::default()
            }),
            shutdown: AtomicBool::new(false),
        });

        let (line_tx, line_rx) = crossbeam_channel::unbounded();
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

        let model = BenchModel {
            period: Duration::from_secs_f64(1.0 / sim.rate_hz),
            deg_per_unit: sim.deg_per_speed_unit,
            noise_lsb: sim.noise_lsb,
            noise: NoiseGenerator::new(sim.seed),
            estimator: AttitudeEstimator::new(sensor.sensitivity),
            tag: sensor.tag.clone(),
            theta_motor: control.theta_motor,
            psi_motor: control.psi_motor,
        };
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("bench-sim".to_string())
            .spawn(move || model.run(thread_shared, cmd_rx, line_tx))
            .map_err(|e| Error::Other(format!("Failed to spawn simulation thread: {}", e)))?;

        log::info!(
            "Simulated bench started: {:.0} Hz, start theta {:+.1}°, psi {:+.1}°",
            sim.rate_hz,
            sim.start_theta_deg,
            sim.start_psi_deg
        );

        Ok((
            Self {
                shared,
                handle: Some(handle),
            },
            AccelStream {
                rx: line_rx,
                pending: Vec::new(),
                read_timeout,
            },
            MotorPort {
                tx: cmd_tx,
                framer: LineFramer::new(),
            },
        ))
    }

    /// Current true pose
    pub fn pose(&self) -> BenchPose {
        *self.shared.pose.lock()
    }
}

impl Drop for SimulatedBench {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct BenchModel {
    period: Duration,
    deg_per_unit: f64,
    noise_lsb: f64,
    noise: NoiseGenerator,
    estimator: AttitudeEstimator,
    tag: String,
    theta_motor: u8,
    psi_motor: u8,
}

impl BenchModel {
    fn run(mut self, shared: Arc<SimShared>, commands: Receiver<MotorCommand>, lines: Sender<Vec<u8>>) {
        let mut last = Instant::now();
        let mut counter: u64 = 0;

        while !shared.shutdown.load(Ordering::Relaxed) {
            let tick_start = Instant::now();
            let dt = tick_start.duration_since(last).as_secs_f64();
            last = tick_start;

            let pose = {
                let mut pose = shared.pose.lock();
                for cmd in commands.try_iter() {
                    self.apply(&mut pose, cmd);
                }
                self.integrate(&mut pose, dt);
                *pose
            };

            let counts = self.estimator.counts_for(pose.theta, pose.psi);
            let raw = counts.map(|c| (c + self.noise.gaussian(self.noise_lsb)).round() as i64);
            let line = format!(
                "{} {} {} {} {}\n",
                self.tag, counter, raw[0], raw[1], raw[2]
            );
            counter += 1;

            if lines.send(line.into_bytes()).is_err() {
                log::debug!("Accelerometer side closed, stopping simulation");
                break;
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.period {
                thread::sleep(self.period - elapsed);
            }
        }
        log::info!("Simulated bench stopped after {} records", counter);
    }

    fn apply(&self, pose: &mut BenchPose, cmd: MotorCommand) {
        match cmd {
            MotorCommand::SetSpeed { motor_id, speed } if motor_id == self.theta_motor => {
                pose.theta_speed = speed;
            }
            MotorCommand::SetSpeed { motor_id, speed } if motor_id == self.psi_motor => {
                pose.psi_speed = speed;
            }
            MotorCommand::SetSpeed { motor_id, .. } => {
                log::warn!("Simulated bench: unknown motor id {}", motor_id);
            }
            MotorCommand::StopAll => {
                pose.theta_speed = 0;
                pose.psi_speed = 0;
            }
        }
    }

    fn integrate(&self, pose: &mut BenchPose, dt: f64) {
        let theta = pose.theta + f64::from(pose.theta_speed) * self.deg_per_unit * dt;
        pose.theta = theta.clamp(-THETA_LIMIT, THETA_LIMIT);
        pose.psi = normalize_angle(pose.psi + f64::from(pose.psi_speed) * self.deg_per_unit * dt);
    }
}

/// Read side of the simulated accelerometer stream
pub struct AccelStream {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl Transport for AccelStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(data) => self.pending = data,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::Disconnected),
            }
        }
        let n = self.pending.len().min(buffer.len());
        buffer[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Write side of the simulated motor controller
///
/// Accepts the same line protocol as the real controller; lines that do not
/// parse are logged and ignored.
pub struct MotorPort {
    tx: Sender<MotorCommand>,
    framer: LineFramer,
}

impl Transport for MotorPort {
    fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut commands = Vec::new();
        self.framer.push(data, |line| match MotorCommand::parse(line) {
            Some(cmd) => commands.push(cmd),
            None => log::warn!("Simulated bench: ignoring {:?}", line),
        });
        for cmd in commands {
            self.tx.send(cmd).map_err(|_| Error::Disconnected)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::framing::parse_record;
    use approx::assert_relative_eq;

    fn sim_config() -> SimulationConfig {
        SimulationConfig {
            rate_hz: 500.0,
            noise_lsb: 0.0,
            seed: 42,
            ..SimulationConfig::default()
        }
    }

    fn spawn(sim: &SimulationConfig) -> (SimulatedBench, AccelStream, MotorPort) {
        SimulatedBench::spawn(
            sim,
            &SensorConfig::default(),
            &ControlConfig::default(),
            Duration::from_millis(100),
        )
        .unwrap()
    }

    fn next_record(stream: &mut AccelStream) -> [i32; 3] {
        let mut framer = LineFramer::new();
        let mut buf = [0u8; 256];
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            let n = stream.read(&mut buf).unwrap();
            let mut found = None;
            framer.push(&buf[..n], |line| {
                if found.is_none() {
                    found = parse_record(line, "ASC3");
                }
            });
            if let Some(raw) = found {
                return raw;
            }
        }
        panic!("no record from simulated bench");
    }

    #[test]
    fn test_emits_records_for_start_pose() {
        let sim = SimulationConfig {
            start_theta_deg: 20.0,
            start_psi_deg: -45.0,
            ..sim_config()
        };
        let (_bench, mut stream, _port) = spawn(&sim);

        let (theta, psi) = AttitudeEstimator::default().estimate(next_record(&mut stream));
        assert_relative_eq!(theta, 20.0, epsilon = 1e-3);
        assert_relative_eq!(psi, -45.0, epsilon = 1e-3);
    }

    #[test]
    fn test_motor_commands_move_axes() {
        let (bench, _stream, mut port) = spawn(&sim_config());

        port.write_all(b"?m1=20\n?m2=-20\n").unwrap();
        thread::sleep(Duration::from_millis(200));
        port.write_all(b"?stopall\n").unwrap();
        thread::sleep(Duration::from_millis(20));

        let pose = bench.pose();
        assert_eq!(pose.theta_speed, 0);
        assert_eq!(pose.psi_speed, 0);
        // 20 units * 0.5 deg/s per unit for ~0.2 s
        assert!(pose.theta > 1.0 && pose.theta < 4.0, "theta {}", pose.theta);
        assert!(pose.psi < -1.0 && pose.psi > -4.0, "psi {}", pose.psi);

        let stopped = bench.pose();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(bench.pose().theta, stopped.theta);
    }

    #[test]
    fn test_theta_hits_mechanical_limit() {
        let sim = SimulationConfig {
            deg_per_speed_unit: 100.0,
            ..sim_config()
        };
        let (bench, _stream, mut port) = spawn(&sim);

        port.write_all(b"?m1=30\n").unwrap();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(bench.pose().theta, THETA_LIMIT);
    }

    #[test]
    fn test_rejects_zero_rate() {
        let sim = SimulationConfig {
            rate_hz: 0.0,
            ..sim_config()
        };
        assert!(
            SimulatedBench::spawn(
                &sim,
                &SensorConfig::default(),
                &ControlConfig::default(),
                Duration::from_millis(10)
            )
            .is_err()
        );
    }
}
