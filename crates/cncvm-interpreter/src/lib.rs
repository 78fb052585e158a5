//! # cncvm Interpreter
//!
//! Turns G-code text into a fully resolved motion trace.
//!
//! The [`gcode`] module tokenizes program text into blocks of address/value
//! words. The [`vm`] module executes those blocks against a modal machine,
//! resolving units and distance modes and expanding arcs into chords, and
//! records every reached point together with the machine state in a
//! [`PositionStack`].
//!
//! ```
//! use cncvm_interpreter::{gcode, vm};
//!
//! let document = gcode::parse("G21 G90\nG1 X10 F300\nM2").unwrap();
//! let trace = vm::process(&document, vm::VmConfig::default()).unwrap();
//! assert_eq!(trace.top().x, 10.0);
//! ```

pub mod error;
pub mod gcode;
pub mod vm;

pub use error::{BlockError, ParseError, VmError};
pub use gcode::{parse, Address, Block, Document, GcodeParser, Token};
pub use vm::{
    Machine, MachineState, MoveMode, Plane, Position, PositionStack, Statement, VmConfig,
};

/// Parse and interpret a program in one step
pub fn interpret(text: &str, config: VmConfig) -> Result<PositionStack, InterpretError> {
    let document = parse(text)?;
    Ok(vm::process(&document, config)?)
}

/// Failure of [`interpret`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpretError {
    /// The program text could not be tokenized
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A block failed while executing
    #[error(transparent)]
    Block(#[from] BlockError),
}
