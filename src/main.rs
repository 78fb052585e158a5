//! cncvm CLI
//!
//! Interprets G-code programs into motion traces, re-exports them as
//! straight-line G-code and streams them to GRBL controllers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cncvm::{
    compile_file, init_logging, interpret, list_ports, open_stream, BufferedCommunicatorConfig,
    BufferedCommunicatorWrapper, Communicator, Config, ConnectionParams, SerialCommunicator,
    StreamConfig, StreamOutcome, StreamProgress, Streamer, Units,
};
use tokio::sync::{mpsc, watch};

#[derive(Parser)]
#[command(name = "cncvm", version)]
#[command(about = "G-code interpreter, optimizer and GRBL sender", long_about = None)]
struct Cli {
    /// Settings file (.toml or .json); defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a program and print its motion trace as JSON
    Trace {
        /// G-code file
        file: PathBuf,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Interpret, optimize and write the program as straight-line G-code
    Export {
        /// G-code file
        file: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output units
        #[arg(long)]
        units: Option<Units>,
        /// Digits after the decimal point
        #[arg(long)]
        precision: Option<usize>,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Interpret, optimize and stream the program to a controller
    Send {
        /// G-code file
        file: PathBuf,
        /// Serial port; falls back to the configured port
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,
        /// Controller receive buffer size in bytes
        #[arg(long)]
        buffer_size: Option<usize>,
        /// Use the blocking sender instead of the async streamer
        #[arg(long)]
        blocking: bool,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// List serial ports that look like CNC controllers
    Ports,
}

#[derive(Args)]
struct PipelineArgs {
    /// Skip the optimizer
    #[arg(long)]
    no_optimize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    init_logging(level)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Trace { file, pretty } => trace(&file, &config, pretty)?,
        Commands::Export {
            file,
            output,
            units,
            precision,
            pipeline,
        } => {
            if let Some(units) = units {
                config.export.units = units;
            }
            if let Some(precision) = precision {
                config.export.precision = precision;
            }
            export(&file, output.as_deref(), &config, !pipeline.no_optimize)?;
        }
        Commands::Send {
            file,
            port,
            baud,
            buffer_size,
            blocking,
            pipeline,
        } => {
            if let Some(port) = port {
                config.connection.port = Some(port);
            }
            if let Some(baud) = baud {
                config.connection.baud_rate = baud;
            }
            if let Some(buffer_size) = buffer_size {
                config.connection.buffer_size = buffer_size;
            }
            config.validate()?;
            send(&file, &config, !pipeline.no_optimize, blocking).await?;
        }
        Commands::Ports => {
            for port in list_ports()? {
                println!("{}\t{}", port.port_name, port.description);
            }
        }
    }

    Ok(())
}

fn trace(file: &Path, config: &Config, pretty: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let trace = interpret(&text, config.interpreter)
        .with_context(|| format!("Failed to interpret {}", file.display()))?;

    let json = if pretty {
        serde_json::to_string_pretty(&trace)?
    } else {
        serde_json::to_string(&trace)?
    };
    println!("{}", json);
    Ok(())
}

fn export(file: &Path, output: Option<&Path>, config: &Config, optimize: bool) -> Result<()> {
    let job = compile_file(file, config, optimize)?;
    let mut text = job.program.join("\n");
    text.push('\n');

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} lines to {}",
                job.program.len(),
                path.display()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}

async fn send(file: &Path, config: &Config, optimize: bool, blocking: bool) -> Result<()> {
    let job = compile_file(file, config, optimize)?;
    let port = config
        .connection
        .port
        .clone()
        .context("No serial port given; use --port or set connection.port")?;
    let params = ConnectionParams {
        timeout_ms: config.connection.timeout_ms,
        ..ConnectionParams::serial(port, config.connection.baud_rate)
    };

    let outcome = if blocking {
        send_blocking(params, config.connection.buffer_size, job.program.clone()).await?
    } else {
        send_streaming(&params, config.connection.buffer_size, &job.program).await?
    };

    match outcome {
        StreamOutcome::Completed { acknowledged } => {
            eprintln!("Sent {} lines", acknowledged);
        }
        StreamOutcome::Aborted { sent, acknowledged } => {
            eprintln!(
                "Aborted after {} of {} lines ({} acknowledged)",
                sent,
                job.program.len(),
                acknowledged
            );
        }
    }
    Ok(())
}

async fn send_streaming(
    params: &ConnectionParams,
    buffer_size: usize,
    program: &[String],
) -> Result<StreamOutcome> {
    let stream = open_stream(params)?;

    let (abort_tx, abort_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborting, waiting for the controller to finish buffered lines");
            let _ = abort_tx.send(true);
        }
    });

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<StreamProgress>();
    let reporter = tokio::spawn(async move {
        let mut last_percent = None;
        while let Some(progress) = progress_rx.recv().await {
            if progress.total == 0 {
                continue;
            }
            let percent = progress.acknowledged * 100 / progress.total;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                eprint!("\r{:3}% ({}/{})", percent, progress.acknowledged, progress.total);
            }
        }
        eprintln!();
    });

    let streamer = Streamer::new(StreamConfig { buffer_size })
        .with_progress(progress_tx)
        .with_abort(abort_rx);
    let outcome = streamer.stream(stream, program).await;
    drop(streamer);
    reporter.await?;

    Ok(outcome?)
}

async fn send_blocking(
    params: ConnectionParams,
    buffer_size: usize,
    program: Vec<String>,
) -> Result<StreamOutcome> {
    let abort = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&abort);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborting, waiting for the controller to finish buffered lines");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let outcome = tokio::task::spawn_blocking(move || -> cncvm::Result<StreamOutcome> {
        let mut communicator = SerialCommunicator::new();
        communicator.connect(&params)?;

        let config = BufferedCommunicatorConfig {
            buffer_size,
            ..BufferedCommunicatorConfig::default()
        };
        let mut wrapper = BufferedCommunicatorWrapper::new(Box::new(communicator), config);
        let outcome = wrapper.send_all(&program, &abort);
        if let Err(e) = wrapper.communicator_mut().disconnect() {
            tracing::warn!("Failed to close serial port: {}", e);
        }
        outcome
    })
    .await??;

    Ok(outcome)
}
