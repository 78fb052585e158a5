//! # cncvm Core
//!
//! Core types shared by the cncvm crates: the unified error type used by the
//! hardware-facing layers and unit conversion helpers.

pub mod error;
pub mod units;

pub use error::{ConnectionError, ControllerError, Error, Result};
pub use units::{format_length, Units, MM_PER_INCH};
