//! GRBL Response Parser
//!
//! Classifies the lines a GRBL controller sends back: acknowledgements,
//! error and alarm codes, status reports, settings, the startup banner and
//! free-form feedback messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GRBL response types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrblResponse {
    /// OK acknowledgment
    Ok,
    /// Error response with error code
    Error(u8),
    /// Alarm response with alarm code
    Alarm(u8),
    /// Status report
    Status(StatusReport),
    /// Setting response ($n=value)
    Setting { number: u8, value: String },
    /// Startup banner ("Grbl 1.1h ['$' for help]")
    Version(String),
    /// Bracketed feedback message ("[MSG:...]")
    Feedback(String),
    /// Anything else
    Message(String),
}

impl GrblResponse {
    /// Whether this response consumes one sent line
    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, Self::Ok | Self::Error(_))
    }
}

impl fmt::Display for GrblResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error(code) => write!(
                f,
                "error:{} ({})",
                code,
                GrblResponseParser::error_description(*code)
            ),
            Self::Alarm(code) => write!(
                f,
                "ALARM:{} ({})",
                code,
                GrblResponseParser::alarm_description(*code)
            ),
            Self::Status(status) => write!(f, "status:{}", status.state),
            Self::Setting { number, value } => write!(f, "setting:${}={}", number, value),
            Self::Version(version) => write!(f, "version:{}", version),
            Self::Feedback(message) => write!(f, "feedback:{}", message),
            Self::Message(msg) => write!(f, "message:{}", msg),
        }
    }
}

/// GRBL status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Machine state ("Idle", "Run", "Hold:0", ...)
    pub state: String,
    /// Machine position, if reported
    pub machine_pos: Option<[f64; 3]>,
    /// Work position, if reported
    pub work_pos: Option<[f64; 3]>,
    /// Planner blocks and receive-buffer bytes available (`Bf:`/`Buf:`)
    pub buffer_state: Option<(u16, u16)>,
    /// Feed rate
    pub feed_rate: Option<f64>,
}

/// GRBL response parser
#[derive(Debug, Default, Clone, Copy)]
pub struct GrblResponseParser;

impl GrblResponseParser {
    /// Create a new GRBL response parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a GRBL response line
    ///
    /// Returns `None` for blank lines.
    pub fn parse(&self, line: &str) -> Option<GrblResponse> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        if line.eq_ignore_ascii_case("ok") {
            return Some(GrblResponse::Ok);
        }

        if let Some(code) = code_after(line, "error:") {
            return Some(GrblResponse::Error(code));
        }

        if let Some(code) = code_after(line, "alarm:") {
            return Some(GrblResponse::Alarm(code));
        }

        if line.starts_with('<') && line.ends_with('>') {
            if let Some(status) = self.parse_status_report(&line[1..line.len() - 1]) {
                return Some(GrblResponse::Status(status));
            }
        }

        if line.starts_with('$') && line.contains('=') {
            if let Some(setting) = self.parse_setting(line) {
                return Some(setting);
            }
        }

        if line.starts_with("Grbl ") {
            return Some(GrblResponse::Version(line.to_string()));
        }

        if line.starts_with('[') && line.ends_with(']') {
            return Some(GrblResponse::Feedback(line[1..line.len() - 1].to_string()));
        }

        Some(GrblResponse::Message(line.to_string()))
    }

    /// Parse the inside of a `<...>` status report
    fn parse_status_report(&self, status_line: &str) -> Option<StatusReport> {
        let mut parts = status_line.split('|');

        let state = parts.next()?.trim().to_string();
        if state.is_empty() {
            return None;
        }

        let mut report = StatusReport {
            state,
            machine_pos: None,
            work_pos: None,
            buffer_state: None,
            feed_rate: None,
        };

        for part in parts {
            let part = part.trim();

            if let Some(pos) = part.strip_prefix("MPos:") {
                report.machine_pos = parse_position(pos);
            } else if let Some(pos) = part.strip_prefix("WPos:") {
                report.work_pos = parse_position(pos);
            } else if let Some(buf) = part
                .strip_prefix("Bf:")
                .or_else(|| part.strip_prefix("Buf:"))
            {
                report.buffer_state = parse_buffer_state(buf);
            } else if let Some(rate) = part.strip_prefix("F:").or_else(|| part.strip_prefix("FS:")) {
                report.feed_rate = rate.split(',').next().and_then(|r| r.parse().ok());
            }
        }

        Some(report)
    }

    /// Parse a setting response
    fn parse_setting(&self, line: &str) -> Option<GrblResponse> {
        let (number, value) = line[1..].split_once('=')?;
        let number = number.trim().parse::<u8>().ok()?;

        Some(GrblResponse::Setting {
            number,
            value: value.trim().to_string(),
        })
    }

    /// Get error description
    pub fn error_description(code: u8) -> &'static str {
        match code {
            1 => "Expected command letter",
            2 => "Bad number format",
            3 => "Invalid statement",
            4 => "Negative value",
            5 => "Setting disabled",
            9 => "G-code locked out during alarm or jog state",
            11 => "Max characters per line exceeded",
            15 => "Travel exceeded",
            20 => "Unsupported or invalid g-code command",
            21 => "Modal group violation",
            22 => "Undefined feed rate",
            23 => "Command value not integer",
            24 => "Axis command conflict",
            33 => "Invalid target",
            _ => "Unknown error",
        }
    }

    /// Get alarm description
    pub fn alarm_description(code: u8) -> &'static str {
        match code {
            1 => "Hard limit triggered",
            2 => "Soft limit exceeded",
            3 => "Abort during cycle",
            4 => "Probe fail",
            5 => "Probe not triggered",
            6 => "Homing fail",
            7 => "Homing fail pulloff",
            8 => "Spindle control failure",
            9 => "Cooling mist control failure",
            _ => "Unknown alarm",
        }
    }
}

/// Code after a case-insensitive prefix such as `error:`
fn code_after(line: &str, prefix: &str) -> Option<u8> {
    let head = line.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    line[prefix.len()..].trim().parse::<u8>().ok()
}

fn parse_position(pos: &str) -> Option<[f64; 3]> {
    let coords: Vec<f64> = pos
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    if coords.len() < 3 {
        return None;
    }
    Some([coords[0], coords[1], coords[2]])
}

fn parse_buffer_state(buf: &str) -> Option<(u16, u16)> {
    let (plan, rx) = buf.split_once(|c| c == ',' || c == ':')?;
    Some((plan.trim().parse().ok()?, rx.trim().parse().ok()?))
}
