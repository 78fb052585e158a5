//! Modal machine state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Active motion mode (G0/G1/G2/G3, G80 clears it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    /// No motion mode selected
    #[default]
    None,
    /// Rapid positioning (G0)
    Rapid,
    /// Linear interpolation (G1)
    Linear,
    /// Clockwise arc (G2)
    ClockwiseArc,
    /// Counter-clockwise arc (G3)
    CounterClockwiseArc,
}

impl MoveMode {
    /// Whether this is one of the arc modes
    pub fn is_arc(self) -> bool {
        matches!(self, Self::ClockwiseArc | Self::CounterClockwiseArc)
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Rapid => write!(f, "Rapid (G0)"),
            Self::Linear => write!(f, "Linear (G1)"),
            Self::ClockwiseArc => write!(f, "Clockwise arc (G2)"),
            Self::CounterClockwiseArc => write!(f, "Counter-clockwise arc (G3)"),
        }
    }
}

/// Arc plane selection (G17/G18/G19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Plane {
    /// G17
    #[default]
    XY,
    /// G18
    XZ,
    /// G19
    YZ,
}

/// Absolute or relative interpretation of coordinates (G90/G91, G90.1/G91.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    /// Values are absolute coordinates
    Absolute,
    /// Values are offsets from the current position
    Relative,
}

/// Modal state snapshotted into every trace entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    /// Feedrate in mm/min
    pub feedrate: f64,
    /// Spindle speed in RPM
    pub spindle_speed: f64,
    /// Active motion mode
    pub move_mode: MoveMode,
    /// Spindle running
    pub spindle_enabled: bool,
    /// Spindle direction, meaningful while enabled
    pub spindle_clockwise: bool,
    /// Flood coolant (M8)
    pub flood_coolant: bool,
    /// Mist coolant (M7)
    pub mist_coolant: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            feedrate: 0.0,
            spindle_speed: 0.0,
            move_mode: MoveMode::None,
            spindle_enabled: false,
            spindle_clockwise: true,
            flood_coolant: false,
            mist_coolant: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = MachineState::default();
        assert_eq!(state.move_mode, MoveMode::None);
        assert!(!state.spindle_enabled);
        assert!(state.spindle_clockwise);
        assert_eq!(Plane::default(), Plane::XY);
    }

    #[test]
    fn test_is_arc() {
        assert!(MoveMode::ClockwiseArc.is_arc());
        assert!(MoveMode::CounterClockwiseArc.is_arc());
        assert!(!MoveMode::Linear.is_arc());
    }
}
