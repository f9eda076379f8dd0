//! Motor controller command definitions
//!
//! Wire format, one ASCII command per line, no acknowledgment:
//!
//! ```text
//! ?m<motor_id>=<speed>   set signed speed of one motor
//! ?stopall               halt every motor
//! ```

use crate::error::Result;
use crate::transport::Transport;
use std::fmt;

/// Motor command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    /// Set a motor's signed speed
    SetSpeed { motor_id: u8, speed: i32 },

    /// Halt all motors
    StopAll,
}

impl MotorCommand {
    /// Wire representation including the line terminator
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }

    /// Parse one wire line (terminator optional)
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "?stopall" {
            return Some(Self::StopAll);
        }
        let (id, speed) = line.strip_prefix("?m")?.split_once('=')?;
        Some(Self::SetSpeed {
            motor_id: id.parse().ok()?,
            speed: speed.parse().ok()?,
        })
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetSpeed { motor_id, speed } => write!(f, "?m{}={}", motor_id, speed),
            Self::StopAll => f.write_str("?stopall"),
        }
    }
}

/// Sink for motor commands
pub trait Actuator: Send {
    fn send(&mut self, cmd: MotorCommand) -> Result<()>;

    fn stop_all(&mut self) -> Result<()> {
        self.send(MotorCommand::StopAll)
    }
}

/// Actuator writing line commands to a transport
pub struct LineActuator<T: Transport> {
    transport: T,
}

impl<T: Transport> LineActuator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> Actuator for LineActuator<T> {
    fn send(&mut self, cmd: MotorCommand) -> Result<()> {
        log::trace!("Motor command: {}", cmd);
        self.transport.write_all(cmd.encode().as_bytes())
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn send(&mut self, cmd: MotorCommand) -> Result<()> {
        (**self).send(cmd)
    }
}
