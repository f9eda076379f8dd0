//! Configuration for TulaCalib
//!
//! Loads configuration from a TOML file. Every section and key is optional;
//! missing values fall back to the bench defaults below.

use crate::error::{Error, Result};
use crate::sampling::SamplingMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub hardware: HardwareConfig,
    pub sensor: SensorConfig,
    pub control: ControlConfig,
    pub sampling: SamplingConfig,
    pub sequence: SequenceConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

/// Hardware endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Accelerometer TCP stream (`host:port`)
    pub accel_address: String,
    /// Motor controller serial port
    pub motor_port: String,
    /// Motor controller baud rate
    pub motor_baud: u32,
    /// Socket read timeout for the accelerometer stream
    pub read_timeout_ms: u64,
}

/// Accelerometer record format
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    /// First token of every valid record
    pub tag: String,
    /// Counts per g
    pub sensitivity: f64,
}

/// Positioning controller tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Proportional gain (speed units per degree of error)
    pub kp: f64,
    /// Speed clamp magnitude
    pub max_speed: f64,
    /// Minimum speed magnitude sent while the axis is not at target
    pub min_speed: f64,
    /// Error below which a move is complete (degrees)
    pub stop_threshold_deg: f64,
    /// Control loop period
    pub period_ms: u64,
    /// Active (unpaused) time budget per move
    pub timeout_s: f64,
    /// Theta safety bound magnitude
    pub theta_limit_deg: f64,
    /// Psi safety bound magnitude
    pub psi_limit_deg: f64,
    /// Motor id driving theta
    pub theta_motor: u8,
    /// Motor id driving psi
    pub psi_motor: u8,
    /// Delay after reaching a psi target before sampling
    pub settle_ms: u64,
}

/// Sampling engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub mode: SamplingMode,
    /// Samples per measurement point
    pub samples: usize,
    /// Upper bound on a single wait for a fresh sample
    pub poll_ms: u64,
}

/// Sequence runner settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Psi position reached before the first step
    pub psi_reference_deg: f64,
    /// Drive both axes to zero after a completed scan
    pub return_home: bool,
    /// Directory receiving `scan_*.csv` artifacts
    pub output_dir: PathBuf,
}

/// Simulated bench parameters (used with `--simulate`)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Accelerometer record rate
    pub rate_hz: f64,
    /// Axis rate in deg/s per unit of commanded speed
    pub deg_per_speed_unit: f64,
    /// Gaussian noise stddev on each count
    pub noise_lsb: f64,
    pub start_theta_deg: f64,
    pub start_psi_deg: f64,
    /// 0 = random each run
    pub seed: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            accel_address: "192.168.4.1:3535".to_string(),
            motor_port: "/dev/ttyUSB0".to_string(),
            motor_baud: 115200,
            read_timeout_ms: 1000,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            tag: "ASC3".to_string(),
            sensitivity: 256_000.0,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            kp: 2.5,
            max_speed: 30.0,
            min_speed: 15.0,
            stop_threshold_deg: 0.9,
            period_ms: 50,
            timeout_s: 30.0,
            theta_limit_deg: 85.0,
            psi_limit_deg: 179.0,
            theta_motor: 1,
            psi_motor: 2,
            settle_ms: 500,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Average,
            samples: 10,
            poll_ms: 10,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            psi_reference_deg: 180.0,
            return_home: true,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100.0,
            deg_per_speed_unit: 0.5,
            noise_lsb: 200.0,
            start_theta_deg: 0.0,
            start_psi_deg: 0.0,
            seed: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ControlConfig {
    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_s)
    }

    #[inline]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Theta safety bounds `(min, max)`
    pub fn theta_bounds(&self) -> (f64, f64) {
        (-self.theta_limit_deg, self.theta_limit_deg)
    }

    /// Psi safety bounds `(min, max)`
    pub fn psi_bounds(&self) -> (f64, f64) {
        (-self.psi_limit_deg, self.psi_limit_deg)
    }
}

impl HardwareConfig {
    #[inline]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl SamplingConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use tula_calib::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("tula.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the control and sampling loops cannot run with
    pub fn validate(&self) -> Result<()> {
        let c = &self.control;
        if !is_positive(c.stop_threshold_deg) {
            return Err(invalid("control.stop_threshold_deg must be > 0"));
        }
        if c.period_ms == 0 {
            return Err(invalid("control.period_ms must be > 0"));
        }
        if !is_positive(c.timeout_s) {
            return Err(invalid("control.timeout_s must be > 0"));
        }
        if c.min_speed < 0.0 || c.min_speed > c.max_speed {
            return Err(invalid("control.min_speed must be within [0, max_speed]"));
        }
        if self.sampling.samples == 0 {
            return Err(invalid("sampling.samples must be > 0"));
        }
        if self.sampling.poll_ms == 0 {
            return Err(invalid("sampling.poll_ms must be > 0"));
        }
        if !is_positive(self.sensor.sensitivity) {
            return Err(invalid("sensor.sensitivity must be > 0"));
        }
        if self.sensor.tag.trim().is_empty() {
            return Err(invalid("sensor.tag must not be empty"));
        }
        Ok(())
    }
}

/// False for zero, negative and NaN
fn is_positive(v: f64) -> bool {
    v > 0.0
}

fn invalid(msg: &str) -> Error {
    Error::InvalidParameter(msg.to_string())
}
