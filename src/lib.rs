//! # cncvm
//!
//! A G-code interpreter that resolves programs into a linear motion trace,
//! optimizes the trace and streams it to GRBL controllers.
//!
//! ## Architecture
//!
//! cncvm is organized as a workspace with multiple crates:
//!
//! 1. **cncvm-core** - Unified error type and unit handling
//! 2. **cncvm-interpreter** - G-code parser and the modal machine producing the trace
//! 3. **cncvm-camtools** - Trace optimizer and G-code exporter
//! 4. **cncvm-communication** - Serial link, GRBL responses, character-counting streaming
//! 5. **cncvm-settings** - Configuration files
//! 6. **cncvm** - Pipeline helpers and the command line tool

use std::path::Path;

use anyhow::Context;

pub use cncvm_camtools::{optimize, GcodeExporter, OptimizerConfig, TraceOptimizer};
pub use cncvm_communication::{
    list_ports, open_stream, BufferedCommunicatorConfig, BufferedCommunicatorWrapper,
    Communicator, ConnectionParams, SerialCommunicator, StreamConfig, StreamOutcome,
    StreamProgress, Streamer,
};
pub use cncvm_core::{ConnectionError, ControllerError, Error, Result, Units};
pub use cncvm_interpreter::{
    interpret, parse, InterpretError, Machine, MachineState, MoveMode, Position, PositionStack,
    VmConfig,
};
pub use cncvm_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// A program carried through the pipeline
#[derive(Debug, Clone)]
pub struct Job {
    /// Trace exactly as interpreted
    pub trace: PositionStack,
    /// Trace after the optimizer passes
    pub optimized: Vec<Position>,
    /// Exported program lines
    pub program: Vec<String>,
}

/// Interpret, optimize and export `text`
///
/// With `optimize` false the optimizer is skipped whatever the configuration
/// says.
pub fn compile(text: &str, config: &Config, optimize: bool) -> anyhow::Result<Job> {
    let trace = interpret(text, config.interpreter)?;

    let optimized = if optimize {
        config.optimizer.validate()?;
        cncvm_camtools::optimize(trace.as_slice(), &config.optimizer)
    } else {
        trace.as_slice().to_vec()
    };

    let program = config.exporter()?.export(&optimized);
    tracing::info!(
        positions = trace.len(),
        optimized = optimized.len(),
        lines = program.len(),
        "compiled program"
    );

    Ok(Job {
        trace,
        optimized,
        program,
    })
}

/// [`compile`] a program file
pub fn compile_file(path: &Path, config: &Config, optimize: bool) -> anyhow::Result<Job> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    compile(&text, config, optimize).with_context(|| format!("Failed to compile {}", path.display()))
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, leaving stdout to program output
/// - RUST_LOG environment variable support, `default_level` otherwise
pub fn init_logging(default_level: tracing::Level) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string().to_lowercase()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
