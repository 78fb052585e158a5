//! # cncvm Communication
//!
//! Moves exported G-code to a GRBL-style controller.
//!
//! The controller has a small receive buffer and answers every line with
//! `ok` or `error:N`. Both senders here count the bytes of unacknowledged
//! lines and only send when the next line still fits, which keeps the
//! buffer full without overflowing it.

pub mod communication;
pub mod firmware;
pub mod streamer;

pub use communication::{
    serial::{bridge, list_ports, open_stream, SerialCommunicator, SerialPortInfo},
    BufferedCommand, BufferedCommunicatorConfig, BufferedCommunicatorWrapper, CommandStatus,
    Communicator, ConnectionParams, NoOpCommunicator, SerialParity,
};
pub use firmware::grbl::{GrblResponse, GrblResponseParser, StatusReport};
pub use streamer::{StreamConfig, StreamOutcome, StreamProgress, Streamer, DEFAULT_BUFFER_SIZE};
