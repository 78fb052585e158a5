//! cncvm Settings Crate
//!
//! Loads, validates and saves the configuration shared by the interpreter,
//! the optimizer, the exporter and the controller link.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, ExportSettings, CONFIG_FILE_NAME};
pub use error::{ConfigError, SettingsError, SettingsResult};
