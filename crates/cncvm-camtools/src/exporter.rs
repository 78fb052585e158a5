//! G-code Exporter
//!
//! Renders a trace back into G-code. Output is modal: a word is only written
//! when it differs from what the controller already has, so straight runs
//! collapse to bare coordinates.

use cncvm_core::{format_length, Units};
use cncvm_interpreter::{MachineState, MoveMode, Position};

use crate::error::{ParameterError, ParameterResult};

const MAX_PRECISION: usize = 6;

/// Trace to G-code renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcodeExporter {
    units: Units,
    precision: usize,
}

impl Default for GcodeExporter {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            precision: 3,
        }
    }
}

/// What the controller holds after the lines emitted so far
#[derive(Debug)]
struct Modal {
    spindle_enabled: bool,
    spindle_clockwise: bool,
    spindle_speed: f64,
    mist: bool,
    flood: bool,
    motion: Option<&'static str>,
    feedrate: Option<String>,
    feedrate_warned: bool,
    coords: [String; 3],
}

impl GcodeExporter {
    /// Create an exporter writing in `units` with `precision` decimals
    pub fn new(units: Units, precision: usize) -> ParameterResult<Self> {
        if precision > MAX_PRECISION {
            return Err(ParameterError::OutOfRange {
                name: "precision".to_string(),
                value: precision as f64,
                min: 0.0,
                max: MAX_PRECISION as f64,
            });
        }
        Ok(Self { units, precision })
    }

    /// Output units
    pub fn units(&self) -> Units {
        self.units
    }

    /// Decimal places for lengths and feedrates
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Render a trace
    ///
    /// The first entry is taken as the machine's starting point and emits
    /// nothing. Entries without a move mode only emit state changes.
    pub fn export(&self, trace: &[Position]) -> Vec<String> {
        let units_code = match self.units {
            Units::Metric => "G21",
            Units::Imperial => "G20",
        };
        let mut lines = vec![units_code.to_string(), "G90".to_string()];

        if let Some((first, rest)) = trace.split_first() {
            let mut modal = Modal {
                spindle_enabled: first.state.spindle_enabled,
                spindle_clockwise: first.state.spindle_clockwise,
                spindle_speed: first.state.spindle_speed,
                mist: first.state.mist_coolant,
                flood: first.state.flood_coolant,
                motion: None,
                feedrate: None,
                feedrate_warned: false,
                coords: self.format_coords(first),
            };

            for position in rest {
                self.emit_spindle(&mut modal, &position.state, &mut lines);
                self.emit_coolant(&mut modal, &position.state, &mut lines);
                self.emit_motion(&mut modal, position, &mut lines);
            }
        }

        lines.push("M2".to_string());
        tracing::debug!(lines = lines.len(), "trace exported");
        lines
    }

    /// Render a trace as one newline-terminated program
    pub fn export_program(&self, trace: &[Position]) -> String {
        let mut program = self.export(trace).join("\n");
        program.push('\n');
        program
    }

    fn length(&self, value_mm: f64) -> String {
        format_length(value_mm, self.units, self.precision)
    }

    fn format_coords(&self, position: &Position) -> [String; 3] {
        [
            self.length(position.x),
            self.length(position.y),
            self.length(position.z),
        ]
    }

    fn emit_spindle(&self, modal: &mut Modal, state: &MachineState, lines: &mut Vec<String>) {
        if state.spindle_enabled {
            let changed = !modal.spindle_enabled
                || modal.spindle_clockwise != state.spindle_clockwise
                || modal.spindle_speed != state.spindle_speed;
            if changed {
                let code = if state.spindle_clockwise { "M3" } else { "M4" };
                lines.push(format!(
                    "{} S{}",
                    code,
                    format_length(state.spindle_speed, Units::Metric, 1)
                ));
            }
        } else if modal.spindle_enabled {
            lines.push("M5".to_string());
        }

        modal.spindle_enabled = state.spindle_enabled;
        modal.spindle_clockwise = state.spindle_clockwise;
        modal.spindle_speed = state.spindle_speed;
    }

    fn emit_coolant(&self, modal: &mut Modal, state: &MachineState, lines: &mut Vec<String>) {
        // M9 is the only way to switch either coolant off.
        if (modal.mist && !state.mist_coolant) || (modal.flood && !state.flood_coolant) {
            lines.push("M9".to_string());
            modal.mist = false;
            modal.flood = false;
        }
        if state.mist_coolant && !modal.mist {
            lines.push("M7".to_string());
            modal.mist = true;
        }
        if state.flood_coolant && !modal.flood {
            lines.push("M8".to_string());
            modal.flood = true;
        }
    }

    fn emit_motion(&self, modal: &mut Modal, position: &Position, lines: &mut Vec<String>) {
        let motion = match position.state.move_mode {
            MoveMode::None => return,
            MoveMode::Rapid => "G0",
            // Traces hold chords only; any arc mode is drawn as a feed move.
            MoveMode::Linear | MoveMode::ClockwiseArc | MoveMode::CounterClockwiseArc => "G1",
        };

        let coords = self.format_coords(position);
        let mut axes = Vec::with_capacity(3);
        for ((letter, value), previous) in ['X', 'Y', 'Z']
            .iter()
            .zip(coords.iter())
            .zip(modal.coords.iter())
        {
            if value != previous {
                axes.push(format!("{}{}", letter, value));
            }
        }
        if axes.is_empty() {
            return;
        }

        let mut words = Vec::with_capacity(5);
        if modal.motion != Some(motion) {
            words.push(motion.to_string());
            modal.motion = Some(motion);
        }
        if motion == "G1" {
            if position.state.feedrate > 0.0 {
                let feedrate = self.length(position.state.feedrate);
                if modal.feedrate.as_deref() != Some(feedrate.as_str()) {
                    words.push(format!("F{}", feedrate));
                    modal.feedrate = Some(feedrate);
                }
            } else if !modal.feedrate_warned {
                tracing::warn!("feed move without a feedrate, F word omitted");
                modal.feedrate_warned = true;
            }
        }
        words.extend(axes);

        lines.push(words.join(" "));
        modal.coords = coords;
    }
}
