//! Unit conversion utilities
//!
//! Handles conversion between Metric (mm) and Imperial (inch) program units.
//! Everything downstream of the interpreter works in millimeters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Program unit mode (G20/G21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Millimeters (G21)
    #[default]
    Metric,
    /// Inches (G20)
    Imperial,
}

impl Units {
    /// Convert a value expressed in these units to millimeters
    pub fn to_metric(self, value: f64) -> f64 {
        match self {
            Self::Metric => value,
            Self::Imperial => value * MM_PER_INCH,
        }
    }

    /// Convert a value in millimeters to these units
    pub fn from_metric(self, value_mm: f64) -> f64 {
        match self {
            Self::Metric => value_mm,
            Self::Imperial => value_mm / MM_PER_INCH,
        }
    }

    /// Unit label ("mm" or "in")
    pub fn label(self) -> &'static str {
        match self {
            Self::Metric => "mm",
            Self::Imperial => "in",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "Metric"),
            Self::Imperial => write!(f, "Imperial"),
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" | "mm" => Ok(Self::Metric),
            "imperial" | "inch" | "in" => Ok(Self::Imperial),
            _ => Err(format!("Unknown unit system: {}", s)),
        }
    }
}

/// Format a millimeter value for output in the given units
///
/// Trailing zeros are trimmed so `10.500` renders as `10.5` and `3.000` as `3`.
pub fn format_length(value_mm: f64, units: Units, precision: usize) -> String {
    let value = units.from_metric(value_mm);
    let mut text = format!("{:.*}", precision, value);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_conversion() {
        assert_eq!(Units::Metric.to_metric(10.5), 10.5);
        assert_eq!(Units::Metric.from_metric(10.5), 10.5);
    }

    #[test]
    fn test_imperial_conversion() {
        // 1 inch = 25.4 mm
        assert_eq!(Units::Imperial.to_metric(1.0), 25.4);
        assert_eq!(Units::Imperial.from_metric(12.7), 0.5);
        assert_eq!(Units::Imperial.to_metric(-1.0), -25.4);
    }

    #[test]
    fn test_format_length_trims() {
        assert_eq!(format_length(10.5, Units::Metric, 4), "10.5");
        assert_eq!(format_length(3.0, Units::Metric, 4), "3");
        assert_eq!(format_length(25.4, Units::Imperial, 4), "1");
        assert_eq!(format_length(0.12345, Units::Metric, 3), "0.123");
        assert_eq!(format_length(-0.00001, Units::Metric, 3), "0");
    }

    #[test]
    fn test_unit_labels_and_parsing() {
        assert_eq!(Units::Metric.label(), "mm");
        assert_eq!(Units::Imperial.label(), "in");
        assert_eq!("MM".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!("inch".parse::<Units>().unwrap(), Units::Imperial);
        assert!("furlong".parse::<Units>().is_err());
    }
}
