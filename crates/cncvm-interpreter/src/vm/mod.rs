//! The modal interpreter
//!
//! This module provides:
//! - Statement lookup over the words of one line
//! - Modal machine state and the position trace
//! - The dispatcher and arc approximation

pub mod arc;
pub mod config;
pub mod machine;
pub mod position;
pub mod state;
pub mod statement;

pub use arc::{segment_count, ArcMove};
pub use config::VmConfig;
pub use machine::{process, Machine, ResolvedTarget};
pub use position::{Position, PositionStack};
pub use state::{DistanceMode, MachineState, MoveMode, Plane};
pub use statement::Statement;
