//! Communication layer
//!
//! A [`Communicator`] is a synchronous byte link to a controller. The
//! serial implementation lives in [`serial`]; [`buffered`] adds
//! character-counting flow control on top of any communicator.

pub mod buffered;
pub mod serial;

use cncvm_core::{ConnectionError, Error, Result};
use serde::{Deserialize, Serialize};

pub use buffered::{
    BufferedCommand, BufferedCommunicatorConfig, BufferedCommunicatorWrapper, CommandStatus,
};

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Parameters for opening a controller link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Port name ("/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Hardware flow control
    pub flow_control: bool,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
            timeout_ms: 10,
        }
    }
}

impl ConnectionParams {
    /// Parameters for `port` at `baud_rate`, everything else default
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Check the parameters can describe a real serial link
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |reason: String| -> Error { ConnectionError::InvalidParameters { reason }.into() };

        if self.port.trim().is_empty() {
            return Err(invalid("no port given".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(invalid("baud rate must be positive".to_string()));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(invalid(format!("invalid data bits: {}", self.data_bits)));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(invalid(format!("invalid stop bits: {}", self.stop_bits)));
        }
        Ok(())
    }
}

/// Synchronous byte link to a controller
pub trait Communicator: Send {
    /// Open the link
    fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Close the link
    fn disconnect(&mut self) -> Result<()>;

    /// Whether the link is open
    fn is_connected(&self) -> bool;

    /// Write raw bytes, returning how many were written
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever bytes are available; empty when nothing arrived in time
    fn receive(&mut self) -> Result<Vec<u8>>;

    /// Parameters of the open link
    fn connection_params(&self) -> Option<&ConnectionParams>;

    /// Send one command line followed by a newline
    fn send_command(&mut self, command: &str) -> Result<()> {
        self.send(command.as_bytes())?;
        self.send(b"\n")?;
        Ok(())
    }
}

/// Communicator that is never connected and discards everything
#[derive(Debug, Default)]
pub struct NoOpCommunicator {
    params: Option<ConnectionParams>,
}

impl NoOpCommunicator {
    /// Create a new no-op communicator
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for NoOpCommunicator {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        self.params = Some(params.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.params = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn connection_params(&self) -> Option<&ConnectionParams> {
        self.params.as_ref()
    }
}
