//! Async G-code streaming
//!
//! Streams program lines to a controller over any async byte stream using
//! character counting: a line is only written while the bytes of all
//! unacknowledged lines plus the new one fit the controller's receive
//! buffer. Writing and reading acknowledgements are interleaved with
//! `tokio::select!`, so the buffer is refilled as soon as an `ok` frees room.

use std::collections::VecDeque;

use cncvm_core::{ConnectionError, ControllerError, Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::firmware::grbl::{GrblResponse, GrblResponseParser};

/// Receive buffer size of a stock GRBL controller, in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 127;

/// Streaming configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Controller receive buffer size in bytes
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Snapshot reported after every send and acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamProgress {
    /// Lines written so far
    pub sent: usize,
    /// Lines acknowledged so far
    pub acknowledged: usize,
    /// Lines in the program
    pub total: usize,
    /// Bytes currently in the controller buffer
    pub in_flight_bytes: usize,
}

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every line was sent and acknowledged
    Completed {
        /// Lines acknowledged
        acknowledged: usize,
    },
    /// Stopped on request after draining in-flight lines
    Aborted {
        /// Lines written before the abort
        sent: usize,
        /// Lines acknowledged
        acknowledged: usize,
    },
}

/// Character-counting line streamer
#[derive(Debug, Default)]
pub struct Streamer {
    config: StreamConfig,
    progress: Option<mpsc::UnboundedSender<StreamProgress>>,
    abort: Option<watch::Receiver<bool>>,
}

/// Why sending stopped early
enum Stop {
    Aborted,
    Failed(Error),
}

impl Streamer {
    /// Create a streamer
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            progress: None,
            abort: None,
        }
    }

    /// Report progress on `progress`
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<StreamProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Stop sending once `abort` turns true
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Stream `lines` over `stream`
    ///
    /// Blank lines are skipped. A controller `error:N` stops sending, waits
    /// for the lines already in flight and returns the rejection. An alarm
    /// returns immediately since the controller stops acknowledging.
    pub async fn stream<S>(&self, stream: S, lines: &[String]) -> Result<StreamOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let lines: Vec<&str> = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();

        if let Some(line) = lines.iter().find(|l| l.len() + 1 > self.config.buffer_size) {
            return Err(ControllerError::BufferOverflow {
                length: line.len() + 1,
                capacity: self.config.buffer_size,
            }
            .into());
        }

        let (reader, mut writer) = tokio::io::split(stream);
        let mut responses = BufReader::new(reader).lines();
        let parser = GrblResponseParser::new();

        let mut progress = StreamProgress {
            total: lines.len(),
            ..StreamProgress::default()
        };
        let mut in_flight: VecDeque<usize> = VecDeque::new();
        let mut stop: Option<Stop> = None;
        let mut abort = self.abort.clone();
        let reporter = self.progress.clone();

        tracing::info!(lines = progress.total, buffer = self.config.buffer_size, "streaming");

        loop {
            if stop.is_none() && abort.as_ref().is_some_and(|rx| *rx.borrow()) {
                tracing::info!("streaming aborted, draining in-flight lines");
                stop = Some(Stop::Aborted);
            }

            let done_sending = stop.is_some() || progress.sent == lines.len();
            if done_sending && in_flight.is_empty() {
                break;
            }

            if !done_sending {
                let line = lines[progress.sent];
                let size = line.len() + 1;
                if progress.in_flight_bytes + size <= self.config.buffer_size {
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;

                    in_flight.push_back(size);
                    progress.sent += 1;
                    progress.in_flight_bytes += size;
                    tracing::trace!(line = progress.sent, command = line, "sent");
                    report(&reporter, progress);
                    continue;
                }
            }

            let watching = stop.is_none() && abort.is_some();
            tokio::select! {
                line = responses.next_line() => {
                    let text = line?.ok_or_else(|| ConnectionError::ConnectionLost {
                        reason: "controller closed the connection".to_string(),
                    })?;

                    match parser.parse(&text) {
                        Some(GrblResponse::Ok) => {
                            acknowledge(&reporter, &mut in_flight, &mut progress, &text)?;
                        }
                        Some(GrblResponse::Error(code)) => {
                            let line = progress.acknowledged + 1;
                            acknowledge(&reporter, &mut in_flight, &mut progress, &text)?;
                            tracing::error!(
                                line,
                                "Command rejected: {}",
                                GrblResponseParser::error_description(code)
                            );
                            if stop.is_none() {
                                stop = Some(Stop::Failed(
                                    ControllerError::CommandRejected { line, code }.into(),
                                ));
                            }
                        }
                        Some(GrblResponse::Alarm(code)) => {
                            tracing::error!("Alarm: {}", GrblResponseParser::alarm_description(code));
                            return Err(ControllerError::Alarm { code }.into());
                        }
                        Some(other) => tracing::debug!("controller: {}", other),
                        None => {}
                    }
                }
                _ = wait_for_abort(&mut abort), if watching => {
                    // Picked up at the top of the loop.
                }
            }
        }

        match stop {
            Some(Stop::Failed(err)) => Err(err),
            Some(Stop::Aborted) => Ok(StreamOutcome::Aborted {
                sent: progress.sent,
                acknowledged: progress.acknowledged,
            }),
            None => {
                tracing::info!(lines = progress.acknowledged, "stream complete");
                Ok(StreamOutcome::Completed {
                    acknowledged: progress.acknowledged,
                })
            }
        }
    }
}

type Reporter = Option<mpsc::UnboundedSender<StreamProgress>>;

fn report(reporter: &Reporter, progress: StreamProgress) {
    if let Some(tx) = reporter {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(progress);
    }
}

fn acknowledge(
    reporter: &Reporter,
    in_flight: &mut VecDeque<usize>,
    progress: &mut StreamProgress,
    response: &str,
) -> Result<()> {
    let size = in_flight
        .pop_front()
        .ok_or_else(|| ControllerError::UnexpectedResponse {
            response: response.to_string(),
        })?;
    progress.acknowledged += 1;
    progress.in_flight_bytes -= size;
    report(reporter, *progress);
    Ok(())
}

/// Resolve once the abort flag is set; never resolves if it cannot be
async fn wait_for_abort(abort: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = abort {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}
