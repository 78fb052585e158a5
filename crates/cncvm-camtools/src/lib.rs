//! # cncvm CAM Tools
//!
//! Post-processing for interpreter traces.
//!
//! - **Optimizer**: drops redundant and collinear points, turns pure Z lifts
//!   into rapids and reorders independent cutting routes to shorten travel
//! - **Exporter**: renders a trace back into modal G-code text

pub mod error;
pub mod exporter;
pub mod optimizer;

pub use error::{ParameterError, ParameterResult};
pub use exporter::GcodeExporter;
pub use optimizer::{optimize, OptimizerConfig, TraceOptimizer};
