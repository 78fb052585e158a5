//! Configuration and settings management for cncvm
//!
//! One file holds every tunable of the pipeline. JSON and TOML are both
//! accepted, chosen by file extension. The default location is
//! `cncvm/config.toml` under the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Interpreter tolerances and arc subdivision bounds
//! - Optimizer passes
//! - Export units and precision
//! - Controller connection (port, baud rate, receive buffer)

use std::path::{Path, PathBuf};

use cncvm_camtools::{GcodeExporter, OptimizerConfig};
use cncvm_core::Units;
use cncvm_interpreter::VmConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// File name of the default configuration
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// G-code export settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Units of the written program
    pub units: Units,
    /// Digits after the decimal point for coordinates
    pub precision: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            precision: 3,
        }
    }
}

/// Controller connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last used serial port
    pub port: Option<String>,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Controller receive buffer size in bytes
    pub buffer_size: usize,
    /// Serial read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            buffer_size: 127,
            timeout_ms: 10,
        }
    }
}

/// Complete application configuration
///
/// Missing sections and keys fall back to their defaults, so a file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Interpreter tolerances
    pub interpreter: VmConfig,
    /// Optimizer passes
    pub optimizer: OptimizerConfig,
    /// Export settings
    pub export: ExportSettings,
    /// Connection settings
    pub connection: ConnectionSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )
            .into()),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let base = dirs::config_dir().or_else(dirs::home_dir).ok_or_else(|| {
            SettingsError::ConfigDirectory("no config or home directory found".to_string())
        })?;
        Ok(base.join("cncvm").join(CONFIG_FILE_NAME))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content).map_err(ConfigError::from)?,
            Format::Toml => toml::from_str(&content).map_err(ConfigError::from)?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise the default file if it exists
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("{}, using default settings", e);
                return Ok(Self::default());
            }
        };

        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::of(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self).map_err(ConfigError::from)?,
            Format::Toml => toml::to_string_pretty(self).map_err(ConfigError::from)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let interpreter = [
            ("interpreter.max_arc_deviation", self.interpreter.max_arc_deviation),
            (
                "interpreter.min_arc_segment_length",
                self.interpreter.min_arc_segment_length,
            ),
            ("interpreter.tolerance", self.interpreter.tolerance),
            ("interpreter.radius_tolerance", self.interpreter.radius_tolerance),
        ];
        for (key, value) in interpreter {
            if !value.is_finite() || value <= 0.0 {
                return Err(SettingsError::invalid(
                    key,
                    format!("must be > 0, got {}", value),
                ));
            }
        }

        if self.interpreter.max_arc_segments == 0 {
            return Err(SettingsError::invalid(
                "interpreter.max_arc_segments",
                "must be > 0",
            ));
        }

        self.optimizer
            .validate()
            .map_err(|e| SettingsError::invalid("optimizer.tolerance", e.to_string()))?;

        self.exporter()?;

        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if self.connection.buffer_size == 0 {
            return Err(SettingsError::invalid("connection.buffer_size", "must be > 0"));
        }
        if self.connection.timeout_ms == 0 {
            return Err(SettingsError::invalid("connection.timeout_ms", "must be > 0"));
        }
        if self
            .connection
            .port
            .as_deref()
            .is_some_and(|port| port.trim().is_empty())
        {
            return Err(SettingsError::invalid("connection.port", "must not be empty"));
        }

        Ok(())
    }

    /// Exporter built from the export section
    pub fn exporter(&self) -> SettingsResult<GcodeExporter> {
        GcodeExporter::new(self.export.units, self.export.precision)
            .map_err(|e| SettingsError::invalid("export.precision", e.to_string()))
    }
}
