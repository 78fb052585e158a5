//! Buffered communication with character-counting flow control
//!
//! Implements the GRBL streaming protocol over a blocking [`Communicator`]:
//! commands are queued, sent while the controller's receive buffer has room
//! for them, and released from the in-flight list as `ok`/`error` responses
//! arrive.
//!
//! # Features
//! - Command queue management
//! - Sender buffer tracking
//! - Flow control to prevent buffer overflow
//! - Command acknowledgment tracking
//! - Pause/resume capabilities
//!
//! A rejected command is never resent: sending stops and the error is
//! reported with the line it belongs to.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use cncvm_core::{ControllerError, Error, Result};
use parking_lot::Mutex;

use crate::communication::Communicator;
use crate::firmware::grbl::{GrblResponse, GrblResponseParser};
use crate::streamer::{StreamOutcome, DEFAULT_BUFFER_SIZE};

/// Status of a command in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Command is queued and waiting to be sent
    Queued,
    /// Command has been sent to the device
    Sent,
    /// Command has been acknowledged by the device
    Acknowledged,
    /// Command was rejected by the device
    Failed,
}

/// A command in the buffer with its metadata
#[derive(Debug, Clone)]
pub struct BufferedCommand {
    /// The command string to send
    pub command: String,
    /// 1-based position of the command in the stream
    pub line: usize,
    /// Current status of the command
    pub status: CommandStatus,
    /// Response from the device
    pub response: Option<String>,
}

impl BufferedCommand {
    /// Create a new buffered command
    pub fn new(command: String, line: usize) -> Self {
        Self {
            command,
            line,
            status: CommandStatus::Queued,
            response: None,
        }
    }

    /// Bytes the command occupies in the controller buffer
    pub fn size(&self) -> usize {
        self.command.len() + 1
    }
}

/// Configuration for buffered communication
#[derive(Debug, Clone)]
pub struct BufferedCommunicatorConfig {
    /// Size of the controller's receive buffer in bytes
    pub buffer_size: usize,
    /// Maximum number of commands to queue
    pub queue_size: usize,
    /// Enable flow control
    pub flow_control: bool,
}

impl Default for BufferedCommunicatorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_size: 100,
            flow_control: true,
        }
    }
}

/// Wrapper around a communicator that adds buffering and flow control
pub struct BufferedCommunicatorWrapper {
    /// The underlying communicator
    communicator: Box<dyn Communicator>,
    /// Configuration for buffering
    config: BufferedCommunicatorConfig,
    /// Queue of commands to send
    command_queue: Mutex<VecDeque<BufferedCommand>>,
    /// Sent commands awaiting acknowledgment, oldest first
    active_commands: Mutex<VecDeque<BufferedCommand>>,
    /// Current amount of data in controller buffer
    sent_buffer_size: usize,
    /// Whether sending is paused
    send_paused: bool,
    /// Lines queued so far, for numbering
    queued_total: usize,
    /// Partial response line received so far
    receive_buffer: String,
    parser: GrblResponseParser,
}

impl BufferedCommunicatorWrapper {
    /// Create a new buffered communicator wrapper
    pub fn new(communicator: Box<dyn Communicator>, config: BufferedCommunicatorConfig) -> Self {
        Self {
            communicator,
            config,
            command_queue: Mutex::new(VecDeque::new()),
            active_commands: Mutex::new(VecDeque::new()),
            sent_buffer_size: 0,
            send_paused: false,
            queued_total: 0,
            receive_buffer: String::new(),
            parser: GrblResponseParser::new(),
        }
    }

    /// Queue a command for sending
    pub fn queue_command(&mut self, command: String) -> Result<()> {
        let command = BufferedCommand::new(command, self.queued_total + 1);

        if self.config.flow_control && command.size() > self.config.buffer_size {
            return Err(ControllerError::BufferOverflow {
                length: command.size(),
                capacity: self.config.buffer_size,
            }
            .into());
        }

        let mut queue = self.command_queue.lock();
        if queue.len() >= self.config.queue_size {
            return Err(Error::other("Command queue is full"));
        }

        queue.push_back(command);
        self.queued_total += 1;
        Ok(())
    }

    /// Get the number of queued commands
    pub fn queued_commands_count(&self) -> usize {
        self.command_queue.lock().len()
    }

    /// Get the number of commands awaiting acknowledgment
    pub fn active_commands_count(&self) -> usize {
        self.active_commands.lock().len()
    }

    /// Nothing queued and nothing in flight
    pub fn is_idle(&self) -> bool {
        self.queued_commands_count() == 0 && self.active_commands_count() == 0
    }

    /// Check if there is room in the controller buffer for a command
    fn has_room_in_buffer(&self, command: &BufferedCommand) -> bool {
        if !self.config.flow_control {
            return true;
        }

        self.sent_buffer_size + command.size() <= self.config.buffer_size
    }

    /// Send queued commands while they fit, returning how many were sent
    pub fn stream_commands(&mut self) -> Result<usize> {
        if self.send_paused {
            return Ok(0);
        }

        let mut sent = 0;
        loop {
            let mut command = {
                let mut queue = self.command_queue.lock();
                match queue.front() {
                    Some(next) if self.has_room_in_buffer(next) => match queue.pop_front() {
                        Some(command) => command,
                        None => break,
                    },
                    _ => break,
                }
            };

            self.communicator
                .send_command(&command.command)
                .inspect_err(|e| tracing::error!("Failed to send command: {}", e))?;

            self.sent_buffer_size += command.size();
            command.status = CommandStatus::Sent;
            tracing::trace!(line = command.line, command = %command.command, "sent");

            self.active_commands.lock().push_back(command);
            sent += 1;
        }

        Ok(sent)
    }

    /// Handle an `ok` from the device, returning the command it completes
    pub fn handle_acknowledgment(&mut self) -> Result<BufferedCommand> {
        let mut command = self.release_oldest("ok")?;
        command.status = CommandStatus::Acknowledged;
        command.response = Some("ok".to_string());
        Ok(command)
    }

    /// Handle an `error:N` from the device
    ///
    /// The rejected command leaves the buffer, sending is paused and the
    /// rejection is returned as an error.
    pub fn handle_error(&mut self, code: u8) -> Result<()> {
        let response = format!("error:{}", code);
        let mut command = self.release_oldest(&response)?;
        command.status = CommandStatus::Failed;
        command.response = Some(response);

        tracing::error!(
            line = command.line,
            command = %command.command,
            "Command rejected: {}",
            GrblResponseParser::error_description(code)
        );

        self.send_paused = true;
        Err(ControllerError::CommandRejected {
            line: command.line,
            code,
        }
        .into())
    }

    fn release_oldest(&mut self, response: &str) -> Result<BufferedCommand> {
        let command = self.active_commands.lock().pop_front().ok_or_else(|| {
            ControllerError::UnexpectedResponse {
                response: response.to_string(),
            }
        })?;
        self.sent_buffer_size = self.sent_buffer_size.saturating_sub(command.size());
        Ok(command)
    }

    /// Apply one parsed response
    pub fn process_response(&mut self, response: &GrblResponse) -> Result<()> {
        match response {
            GrblResponse::Ok => {
                self.handle_acknowledgment()?;
            }
            GrblResponse::Error(code) => self.handle_error(*code)?,
            GrblResponse::Alarm(code) => {
                tracing::error!("Alarm: {}", GrblResponseParser::alarm_description(*code));
                self.send_paused = true;
                return Err(ControllerError::Alarm { code: *code }.into());
            }
            other => tracing::debug!("controller: {}", other),
        }
        Ok(())
    }

    /// Read available bytes from the device and apply every complete line
    ///
    /// Returns the number of responses processed.
    pub fn poll_responses(&mut self) -> Result<usize> {
        let data = self.communicator.receive()?;
        self.receive_buffer.push_str(&String::from_utf8_lossy(&data));

        let mut processed = 0;
        while let Some(pos) = self.receive_buffer.find('\n') {
            let line: String = self.receive_buffer.drain(..=pos).collect();
            if let Some(response) = self.parser.parse(&line) {
                processed += 1;
                self.process_response(&response)?;
            }
        }
        Ok(processed)
    }

    /// Stream every line to completion
    ///
    /// Blank lines are skipped. Once `abort` is set nothing more is sent, but
    /// lines already in the controller buffer are still acknowledged before
    /// returning [`StreamOutcome::Aborted`].
    pub fn send_all(&mut self, lines: &[String], abort: &AtomicBool) -> Result<StreamOutcome> {
        let mut pending = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .peekable();
        let mut sent = 0;
        let mut acknowledged = 0;
        let mut aborted = false;

        loop {
            if !aborted && abort.load(Ordering::Relaxed) {
                tracing::info!("streaming aborted, draining in-flight commands");
                aborted = true;
                self.command_queue.lock().clear();
            }

            if !aborted {
                while self.queued_commands_count() < self.config.queue_size {
                    match pending.next() {
                        Some(line) => self.queue_command(line.to_string())?,
                        None => break,
                    }
                }
                sent += self.stream_commands()?;
            }

            let in_flight = self.active_commands_count();
            let finished = self.queued_commands_count() == 0 && pending.peek().is_none();
            if in_flight == 0 && (aborted || finished) {
                break;
            }

            self.poll_responses()?;
            acknowledged = sent - self.active_commands_count();
        }

        Ok(if aborted {
            StreamOutcome::Aborted { sent, acknowledged }
        } else {
            StreamOutcome::Completed { acknowledged }
        })
    }

    /// Pause sending commands
    pub fn pause(&mut self) {
        self.send_paused = true;
    }

    /// Resume sending commands
    pub fn resume(&mut self) -> Result<usize> {
        self.send_paused = false;
        self.stream_commands()
    }

    /// Check if sending is paused
    pub fn is_paused(&self) -> bool {
        self.send_paused
    }

    /// Clear all queued and in-flight commands
    pub fn clear_queue(&mut self) {
        self.command_queue.lock().clear();
        self.active_commands.lock().clear();
        self.sent_buffer_size = 0;
        self.send_paused = false;
        self.receive_buffer.clear();
    }

    /// Bytes currently occupying the controller buffer
    pub fn buffer_used(&self) -> usize {
        self.sent_buffer_size
    }

    /// Get the current buffer usage as a percentage
    pub fn buffer_usage_percent(&self) -> u32 {
        if self.config.buffer_size == 0 {
            return 0;
        }

        ((self.sent_buffer_size as f64 / self.config.buffer_size as f64) * 100.0) as u32
    }

    /// Get a reference to the underlying communicator
    pub fn communicator(&self) -> &dyn Communicator {
        self.communicator.as_ref()
    }

    /// Get a mutable reference to the underlying communicator
    pub fn communicator_mut(&mut self) -> &mut dyn Communicator {
        self.communicator.as_mut()
    }
}
