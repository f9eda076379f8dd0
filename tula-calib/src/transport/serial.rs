//! Motor controller link over a serial port
//!
//! The controller takes newline-terminated `?m<id>=<speed>` / `?stopall` lines at
//! 8N1 with no flow control. Reads are only used to drain its echo, so a
//! read timeout surfaces as an empty read rather than an error.

use super::Transport;
use crate::config::HardwareConfig;
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};

/// Serial link to the two-axis motor controller
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `hardware.motor_port` at `hardware.motor_baud`
    pub fn open(hardware: &HardwareConfig) -> Result<Self> {
        let port = serialport::new(&hardware.motor_port, hardware.motor_baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(hardware.read_timeout())
            .open()?;

        log::info!(
            "Motor controller on {} at {} baud",
            hardware.motor_port,
            hardware.motor_baud
        );

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}
