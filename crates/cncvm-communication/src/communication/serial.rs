//! Serial port communication
//!
//! Port discovery, a blocking [`Communicator`] over the `serialport` crate,
//! and a bridge that exposes an open port as a tokio byte stream.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use cncvm_core::{ConnectionError, Error, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::{Communicator, ConnectionParams, SerialParity};

const BRIDGE_CAPACITY: usize = 4096;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor and product IDs if applicable
    pub usb_ids: Option<(u16, u16)>,
}

/// List serial ports that look like CNC controllers
///
/// Only USB/ACM style devices are reported:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::SerialError {
            reason: format!("failed to enumerate ports: {}", e),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_valid_cnc_port(&port.port_name))
        .map(|port| match &port.port_type {
            serialport::SerialPortType::UsbPort(usb) => SerialPortInfo {
                port_name: port.port_name.clone(),
                description: format!(
                    "USB {} {}",
                    usb.manufacturer.as_deref().unwrap_or("Device"),
                    usb.product.as_deref().unwrap_or("Serial Port")
                ),
                manufacturer: usb.manufacturer.clone(),
                usb_ids: Some((usb.vid, usb.pid)),
            },
            _ => SerialPortInfo {
                port_name: port.port_name.clone(),
                description: "Serial Port".to_string(),
                manufacturer: None,
                usb_ids: None,
            },
        })
        .collect())
}

fn is_valid_cnc_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

/// Blocking serial link
#[derive(Default)]
pub struct SerialCommunicator {
    port: Option<Box<dyn serialport::SerialPort>>,
    params: Option<ConnectionParams>,
}

impl SerialCommunicator {
    /// Create a closed communicator
    pub fn new() -> Self {
        Self::default()
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            ConnectionError::ConnectionLost {
                reason: "port is not open".to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for SerialCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialCommunicator")
            .field("connected", &self.port.is_some())
            .field("params", &self.params)
            .finish()
    }
}

impl Communicator for SerialCommunicator {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        params.validate()?;

        let data_bits = match params.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        };
        let stop_bits = match params.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };

        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.timeout_ms))
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(params.parity))
            .flow_control(if params.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            })
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                match e.kind() {
                    serialport::ErrorKind::NoDevice => ConnectionError::PortNotFound {
                        port: params.port.clone(),
                    },
                    _ => ConnectionError::FailedToOpen {
                        port: params.port.clone(),
                        reason: e.to_string(),
                    },
                }
            })?;

        tracing::info!(port = %params.port, baud = params.baud_rate, "serial port opened");
        self.port = Some(port);
        self.params = Some(params.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            tracing::info!("serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let port = self.port()?;
        let mut buf = [0u8; 256];
        match port.read(&mut buf) {
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(ConnectionError::ConnectionLost {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn connection_params(&self) -> Option<&ConnectionParams> {
        self.params.as_ref()
    }
}

/// Open a serial port and expose it as an async byte stream
///
/// Must be called from within a tokio runtime. Bytes are shuttled between
/// the port and the returned stream by a blocking reader and an async
/// writer task; both stop once the stream is dropped or the port fails.
pub fn open_stream(params: &ConnectionParams) -> Result<DuplexStream> {
    let mut communicator = SerialCommunicator::new();
    communicator.connect(params)?;
    bridge(communicator)
}

/// Bridge any communicator to an async byte stream
pub fn bridge<C: Communicator + 'static>(communicator: C) -> Result<DuplexStream> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::other(format!("serial bridge needs a tokio runtime: {}", e)))?;

    let (local, remote) = tokio::io::duplex(BRIDGE_CAPACITY);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);
    let communicator = Arc::new(Mutex::new(communicator));

    let reader = Arc::clone(&communicator);
    let runtime = handle.clone();
    handle.spawn_blocking(move || loop {
        let data = match reader.lock().receive() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("serial read failed: {}", e);
                break;
            }
        };
        if data.is_empty() {
            // An empty write only fails once the local end is dropped.
            if runtime.block_on(remote_write.write(&[])).is_err() {
                break;
            }
            // Leave the port to the writer between read timeouts.
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        if runtime.block_on(remote_write.write_all(&data)).is_err() {
            break;
        }
    });

    let writer = communicator;
    handle.spawn(async move {
        let mut buf = vec![0u8; BRIDGE_CAPACITY];
        loop {
            let n = match remote_read.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let data = buf[..n].to_vec();
            let port = Arc::clone(&writer);
            let sent = tokio::task::spawn_blocking(move || port.lock().send(&data)).await;
            match sent {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!("serial write failed: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::error!("serial writer task failed: {}", e);
                    break;
                }
            }
        }
        if let Err(e) = writer.lock().disconnect() {
            tracing::warn!("failed to close serial port: {}", e);
        }
    });

    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_cnc_port() {
        assert!(is_valid_cnc_port("COM3"));
        assert!(is_valid_cnc_port("/dev/ttyUSB0"));
        assert!(is_valid_cnc_port("/dev/ttyACM1"));
        assert!(is_valid_cnc_port("/dev/cu.usbmodem14101"));
        assert!(!is_valid_cnc_port("COM"));
        assert!(!is_valid_cnc_port("COMX"));
        assert!(!is_valid_cnc_port("/dev/ttyS0"));
    }

    #[test]
    fn test_closed_communicator_errors() {
        let mut comm = SerialCommunicator::new();
        assert!(!comm.is_connected());
        assert!(comm.send(b"?").unwrap_err().is_connection_error());
        assert!(comm.receive().is_err());
    }

    #[test]
    fn test_connect_rejects_missing_port() {
        let mut comm = SerialCommunicator::new();
        let err = comm.connect(&ConnectionParams::default()).unwrap_err();
        assert!(err.is_connection_error());
    }
}
