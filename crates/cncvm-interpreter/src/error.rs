//! Error types for the interpreter crate.
//!
//! Parsing errors are reported with the source line they occurred on.
//! Machine errors are raised while a single statement is dispatched and are
//! wrapped in a [`BlockError`] by [`Machine::process`](crate::vm::Machine::process)
//! so callers know which line aborted the program.

use crate::gcode::Address;
use thiserror::Error;

/// Errors produced while turning program text into blocks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line contains text that is not a word or comment
    #[error("Invalid syntax at line {line_number}: {reason}")]
    InvalidSyntax {
        /// The 1-based source line.
        line_number: usize,
        /// Description of the offending text.
        reason: String,
    },

    /// A word uses an address letter the interpreter does not support
    #[error("Unsupported address '{letter}' at line {line_number}")]
    UnsupportedAddress {
        /// The 1-based source line.
        line_number: usize,
        /// The address letter as written.
        letter: char,
    },

    /// A comment was opened but never closed
    #[error("Unterminated comment at line {line_number}")]
    UnterminatedComment {
        /// The 1-based source line.
        line_number: usize,
    },
}

/// Errors raised by the machine while dispatching a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// A single-valued address appears zero or more than once
    #[error("Address {address} must appear exactly once, found {count}")]
    AmbiguousOrMissingField {
        /// The requested address.
        address: Address,
        /// Number of occurrences on the line.
        count: usize,
    },

    /// Feedrate is zero or negative
    #[error("Invalid feedrate {value}: must be greater than zero")]
    InvalidFeedrate {
        /// The resolved (metric) feedrate.
        value: f64,
    },

    /// Spindle speed is negative
    #[error("Invalid spindle speed {value}: must not be negative")]
    InvalidSpindleSpeed {
        /// The requested spindle speed.
        value: f64,
    },

    /// Motion words without a G0/G1/G2/G3 mode in effect
    #[error("Motion requested without an active move mode")]
    NoActiveMoveMode,

    /// Arc with its center on one of its endpoints
    #[error("Degenerate arc: radius is zero")]
    DegenerateArc,

    /// Arc center is not equidistant from start and end
    #[error("Arc radius mismatch: start radius {start_radius}, end radius {end_radius}")]
    RadiusMismatch {
        /// Distance from center to the start point.
        start_radius: f64,
        /// Distance from center to the end point.
        end_radius: f64,
    },

    /// The P word of an arc is not a non-negative whole number of turns
    #[error("Invalid arc turn count P{value}")]
    InvalidArcTurns {
        /// The P value as written.
        value: f64,
    },

    /// Arc would need more chords than the configured limit
    #[error("Arc needs {segments} segments, limit is {limit}")]
    TooManyArcSegments {
        /// Chords the arc would need.
        segments: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// G code not supported by the interpreter
    #[error("Unsupported G-code G{code}")]
    UnsupportedGCode {
        /// The G value as written.
        code: f64,
    },

    /// M code not supported by the interpreter
    #[error("Unsupported M-code M{code}")]
    UnsupportedMCode {
        /// The M value as written.
        code: f64,
    },
}

/// A machine error tagged with the source line that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line_number}: {source}")]
pub struct BlockError {
    /// The 1-based source line of the failing block.
    pub line_number: usize,
    /// What went wrong.
    #[source]
    pub source: VmError,
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for machine operations.
pub type VmResult<T> = Result<T, VmError>;
