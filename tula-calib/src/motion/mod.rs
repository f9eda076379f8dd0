//! Motion control subsystem

pub mod commands;
pub mod constraints;
pub mod controller;

pub use commands::{Actuator, LineActuator, MotorCommand};
pub use constraints::SpeedLaw;
pub use controller::PositionController;
