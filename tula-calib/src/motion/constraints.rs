//! Speed law and safety limits for the positioning controller

use crate::attitude::clamp;
use crate::config::ControlConfig;

/// Proportional speed law with saturation and a minimum-speed floor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLaw {
    /// Speed units per degree of error
    pub kp: f64,
    /// Saturation magnitude
    pub max_speed: f64,
    /// Floor magnitude, prevents stalling just short of the target
    pub min_speed: f64,
}

impl SpeedLaw {
    pub fn from_config(config: &ControlConfig) -> Self {
        Self {
            kp: config.kp,
            max_speed: config.max_speed,
            min_speed: config.min_speed,
        }
    }

    /// Signed speed for an angle error in degrees
    ///
    /// `clamp(kp * error, -max, max)`, then raised to `min_speed` magnitude
    /// keeping its sign. A speed of exactly zero stays zero.
    pub fn speed(&self, error_deg: f64) -> f64 {
        let speed = clamp(self.kp * error_deg, -self.max_speed, self.max_speed);
        if speed == 0.0 {
            return 0.0;
        }
        if speed.abs() < self.min_speed {
            self.min_speed.copysign(speed)
        } else {
            speed
        }
    }

    /// Speed as sent on the wire (truncated toward zero)
    #[inline]
    pub fn command(&self, error_deg: f64) -> i32 {
        self.speed(error_deg) as i32
    }
}
