//! Error handling for cncvm
//!
//! Provides the error types shared by the streaming and configuration layers:
//! - Controller errors (responses reported by the firmware)
//! - Connection errors (serial link and transport)
//!
//! Interpreter and parser errors live next to the interpreter, since they
//! carry program-specific context. All error types use `thiserror`.

use thiserror::Error;

/// Controller error type
///
/// Represents conditions reported by the CNC controller while a program
/// is being streamed to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// Command was rejected by controller (`error:N`)
    #[error("Command rejected at line {line}: error:{code}")]
    CommandRejected {
        /// The 1-based index of the rejected line in the stream.
        line: usize,
        /// The error code reported by the controller.
        code: u8,
    },

    /// Alarm condition detected (`ALARM:N`)
    #[error("Alarm: {code}")]
    Alarm {
        /// The alarm code.
        code: u8,
    },

    /// A single command does not fit the controller's receive buffer
    #[error("Command of {length} bytes exceeds the {capacity} byte controller buffer")]
    BufferOverflow {
        /// Length of the offending command including its newline.
        length: usize,
        /// Size of the controller receive buffer.
        capacity: usize,
    },

    /// Controller acknowledged more commands than were sent
    #[error("Unexpected acknowledgement: {response}")]
    UnexpectedResponse {
        /// The response line.
        response: String,
    },
}

/// Connection error type
///
/// Represents errors related to the link with the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Main error type for cncvm
///
/// A unified error type for the layers that talk to hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_error_display() {
        let err = ControllerError::CommandRejected { line: 12, code: 20 };
        assert_eq!(err.to_string(), "Command rejected at line 12: error:20");

        let err = ControllerError::BufferOverflow {
            length: 200,
            capacity: 127,
        };
        assert_eq!(
            err.to_string(),
            "Command of 200 bytes exceeds the 127 byte controller buffer"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ControllerError::Alarm { code: 1 }.into();
        assert!(err.is_controller_error());
        assert!(!err.is_connection_error());

        let err: Error = ConnectionError::PortNotFound {
            port: "/dev/ttyUSB0".to_string(),
        }
        .into();
        assert!(err.is_connection_error());
        assert_eq!(err.to_string(), "Port not found: /dev/ttyUSB0");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
