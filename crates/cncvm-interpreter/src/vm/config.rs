//! Interpreter tolerances

use serde::{Deserialize, Serialize};

/// Numeric policy of the machine
///
/// All lengths are in millimeters. Every value is expected to be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum distance between an arc and the chords approximating it
    pub max_arc_deviation: f64,
    /// Shortest chord an arc is split into
    pub min_arc_segment_length: f64,
    /// Distance within which two points count as the same, e.g. the start
    /// and end of a full-circle arc
    pub tolerance: f64,
    /// Allowed relative difference between an arc's start and end radius
    pub radius_tolerance: f64,
    /// Most chords a single arc may be split into
    pub max_arc_segments: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_arc_deviation: 0.002,
            min_arc_segment_length: 0.01,
            tolerance: 0.001,
            radius_tolerance: 0.01,
            max_arc_segments: 200_000,
        }
    }
}
