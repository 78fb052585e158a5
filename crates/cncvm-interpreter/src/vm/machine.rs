//! The interpreter
//!
//! A [`Machine`] executes statements one at a time against its modal state
//! and records every resolved point in a [`PositionStack`]. Recognized codes
//! are applied unconditionally in a fixed order (G, M, F, S, then motion)
//! regardless of where they appear on the line; anything unrecognized is an
//! error.

use cncvm_core::Units;

use super::arc::{self, ArcMove};
use super::{
    DistanceMode, MachineState, MoveMode, Plane, Position, PositionStack, Statement, VmConfig,
};
use crate::error::{BlockError, VmError, VmResult};
use crate::gcode::{Address, Document};

const MOTION_AXES: [Address; 3] = [Address::X, Address::Y, Address::Z];
const CODE_EPSILON: f64 = 1e-6;

/// Fully resolved target of a statement, absolute and in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedTarget {
    /// Target X
    pub x: f64,
    /// Target Y
    pub y: f64,
    /// Target Z
    pub z: f64,
    /// Arc center X
    pub i: f64,
    /// Arc center Y
    pub j: f64,
    /// Arc center Z
    pub k: f64,
}

/// Modal G-code interpreter
#[derive(Debug, Clone)]
pub struct Machine {
    state: MachineState,
    units: Units,
    move_distance: DistanceMode,
    arc_distance: DistanceMode,
    plane: Plane,
    config: VmConfig,
    completed: bool,
    positions: PositionStack,
}

impl Machine {
    /// Create a machine with default modal state and a seeded trace
    pub fn new(config: VmConfig) -> Self {
        Self {
            state: MachineState::default(),
            units: Units::Metric,
            move_distance: DistanceMode::Absolute,
            arc_distance: DistanceMode::Relative,
            plane: Plane::XY,
            config,
            completed: false,
            positions: PositionStack::new(),
        }
    }

    /// Run every non-deleted block of a document, then finalize the trace
    ///
    /// Stops at the first failing block. Statements before it keep their
    /// effect on the machine; the trace is not finalized in that case.
    pub fn process(&mut self, document: &Document) -> Result<(), BlockError> {
        for block in document.blocks.iter().filter(|b| !b.block_delete) {
            let statement = Statement::from(block);
            self.run(&statement).map_err(|source| {
                tracing::debug!(line = block.line_number, %source, "statement failed");
                BlockError {
                    line_number: block.line_number,
                    source,
                }
            })?;
        }
        self.finalize();

        tracing::debug!(
            blocks = document.len(),
            positions = self.positions.len(),
            "program processed"
        );
        Ok(())
    }

    /// Apply one statement
    ///
    /// A no-op once the program has ended (M2/M30).
    pub fn run(&mut self, stmt: &Statement) -> VmResult<()> {
        if self.completed {
            return Ok(());
        }

        for code in stmt.get_all(Address::G) {
            self.apply_g_code(code)?;
        }

        for code in stmt.get_all(Address::M) {
            self.apply_m_code(code)?;
        }

        for feedrate in stmt.get_all(Address::F) {
            let feedrate = self.units.to_metric(feedrate);
            if feedrate <= 0.0 {
                return Err(VmError::InvalidFeedrate { value: feedrate });
            }
            self.state.feedrate = feedrate;
        }

        for speed in stmt.get_all(Address::S) {
            if speed < 0.0 {
                return Err(VmError::InvalidSpindleSpeed { value: speed });
            }
            self.state.spindle_speed = speed;
        }

        if stmt.includes(&MOTION_AXES) {
            match self.state.move_mode {
                MoveMode::None => return Err(VmError::NoActiveMoveMode),
                mode if mode.is_arc() => self.arc(stmt)?,
                _ => self.positioning(stmt)?,
            }
        }

        Ok(())
    }

    /// Make sure the trace ends with the live state
    ///
    /// Modal changes after the last move (e.g. a trailing `M5`) are only
    /// visible in the trace once anchored to an entry, so one is added at the
    /// current coordinates.
    pub fn finalize(&mut self) {
        let top = *self.positions.top();
        if self.state != top.state {
            self.state.move_mode = MoveMode::None;
            self.positions
                .push(Position::new(self.state, top.x, top.y, top.z));
        }
    }

    /// Resolve the target and arc center of a statement
    ///
    /// Missing axes keep the current coordinate. Unit conversion and the
    /// independent linear/arc distance modes are applied here, so the result
    /// is always absolute and metric.
    pub fn calc_pos(&self, stmt: &Statement) -> VmResult<ResolvedTarget> {
        let current = self.positions.top();
        let units = self.units;
        let relative_move = self.move_distance == DistanceMode::Relative;

        let axis = |address: Address, current: f64| -> VmResult<f64> {
            Ok(match stmt.get_optional(address)? {
                Some(value) if relative_move => current + units.to_metric(value),
                Some(value) => units.to_metric(value),
                None => current,
            })
        };

        let relative_arc = self.arc_distance == DistanceMode::Relative;
        let center = |address: Address, current: f64| -> VmResult<f64> {
            let offset = units.to_metric(stmt.get_optional(address)?.unwrap_or(0.0));
            Ok(if relative_arc { current + offset } else { offset })
        };

        Ok(ResolvedTarget {
            x: axis(Address::X, current.x)?,
            y: axis(Address::Y, current.y)?,
            z: axis(Address::Z, current.z)?,
            i: center(Address::I, current.x)?,
            j: center(Address::J, current.y)?,
            k: center(Address::K, current.z)?,
        })
    }

    /// Current modal state
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Current program units
    pub fn units(&self) -> Units {
        self.units
    }

    /// Distance mode for X/Y/Z (G90/G91)
    pub fn move_distance_mode(&self) -> DistanceMode {
        self.move_distance
    }

    /// Distance mode for I/J/K (G90.1/G91.1)
    pub fn arc_distance_mode(&self) -> DistanceMode {
        self.arc_distance
    }

    /// Active arc plane
    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// Machine tolerances
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Whether an end-of-program code has been executed
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// The trace so far
    pub fn positions(&self) -> &PositionStack {
        &self.positions
    }

    /// Consume the machine, keeping its trace
    pub fn into_positions(self) -> PositionStack {
        self.positions
    }

    fn apply_g_code(&mut self, code: f64) -> VmResult<()> {
        // Codes are compared in tenths so G90.1 and G91.1 stay distinct.
        let tenths = code * 10.0;
        if (tenths - tenths.round()).abs() > CODE_EPSILON {
            return Err(VmError::UnsupportedGCode { code });
        }
        match tenths.round() as i64 {
            0 => self.state.move_mode = MoveMode::Rapid,
            10 => self.state.move_mode = MoveMode::Linear,
            20 => self.state.move_mode = MoveMode::ClockwiseArc,
            30 => self.state.move_mode = MoveMode::CounterClockwiseArc,
            170 => self.plane = Plane::XY,
            180 => self.plane = Plane::XZ,
            190 => self.plane = Plane::YZ,
            200 => self.units = Units::Imperial,
            210 => self.units = Units::Metric,
            800 => self.state.move_mode = MoveMode::None,
            900 => self.move_distance = DistanceMode::Absolute,
            910 => self.move_distance = DistanceMode::Relative,
            901 => self.arc_distance = DistanceMode::Absolute,
            911 => self.arc_distance = DistanceMode::Relative,
            _ => return Err(VmError::UnsupportedGCode { code }),
        }
        Ok(())
    }

    fn apply_m_code(&mut self, code: f64) -> VmResult<()> {
        if code.fract() != 0.0 {
            return Err(VmError::UnsupportedMCode { code });
        }
        match code as i64 {
            2 | 30 => self.completed = true,
            3 => {
                self.state.spindle_enabled = true;
                self.state.spindle_clockwise = true;
            }
            4 => {
                self.state.spindle_enabled = true;
                self.state.spindle_clockwise = false;
            }
            5 => self.state.spindle_enabled = false,
            7 => self.state.mist_coolant = true,
            8 => self.state.flood_coolant = true,
            9 => {
                self.state.mist_coolant = false;
                self.state.flood_coolant = false;
            }
            _ => return Err(VmError::UnsupportedMCode { code }),
        }
        Ok(())
    }

    fn positioning(&mut self, stmt: &Statement) -> VmResult<()> {
        let target = self.calc_pos(stmt)?;
        self.push_point([target.x, target.y, target.z]);
        Ok(())
    }

    fn push_point(&mut self, [x, y, z]: [f64; 3]) {
        self.positions.push(Position::new(self.state, x, y, z));
    }

    fn arc(&mut self, stmt: &Statement) -> VmResult<()> {
        let turns = match stmt.get_optional(Address::P)? {
            None => 0,
            Some(p) if p >= 0.0 && p.fract() == 0.0 && p <= f64::from(u32::MAX) => p as u32,
            Some(p) => return Err(VmError::InvalidArcTurns { value: p }),
        };

        let start = self.positions.top().coords();
        let target = self.calc_pos(stmt)?;
        let arc = ArcMove {
            start,
            end: [target.x, target.y, target.z],
            center: [target.i, target.j, target.k],
            clockwise: self.state.move_mode == MoveMode::ClockwiseArc,
            turns,
            plane: self.plane,
        };
        let points = arc::approximate(&arc, &self.config)?;

        // The trace only ever contains straight moves, and the machine stays
        // in linear mode afterwards.
        self.state.move_mode = MoveMode::Linear;
        for point in points {
            self.push_point(point);
        }

        Ok(())
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

/// Interpret a document with a fresh machine and return its trace
pub fn process(document: &Document, config: VmConfig) -> Result<PositionStack, BlockError> {
    let mut machine = Machine::new(config);
    machine.process(document)?;
    Ok(machine.into_positions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::Token;

    fn stmt(words: &[(Address, f64)]) -> Statement {
        words.iter().map(|&(a, v)| Token::new(a, v)).collect()
    }

    #[test]
    fn test_g_codes_set_modes() {
        let mut machine = Machine::default();
        machine
            .run(&stmt(&[
                (Address::G, 91.0),
                (Address::G, 90.1),
                (Address::G, 18.0),
                (Address::G, 20.0),
                (Address::G, 1.0),
            ]))
            .unwrap();
        assert_eq!(machine.move_distance_mode(), DistanceMode::Relative);
        assert_eq!(machine.arc_distance_mode(), DistanceMode::Absolute);
        assert_eq!(machine.plane(), Plane::XZ);
        assert_eq!(machine.units(), Units::Imperial);
        assert_eq!(machine.state().move_mode, MoveMode::Linear);

        machine.run(&stmt(&[(Address::G, 80.0)])).unwrap();
        assert_eq!(machine.state().move_mode, MoveMode::None);
    }

    #[test]
    fn test_unsupported_codes() {
        let mut machine = Machine::default();
        assert_eq!(
            machine.run(&stmt(&[(Address::G, 4.0)])),
            Err(VmError::UnsupportedGCode { code: 4.0 })
        );
        assert_eq!(
            machine.run(&stmt(&[(Address::M, 6.0)])),
            Err(VmError::UnsupportedMCode { code: 6.0 })
        );
        assert_eq!(
            machine.run(&stmt(&[(Address::M, 3.5)])),
            Err(VmError::UnsupportedMCode { code: 3.5 })
        );
    }

    #[test]
    fn test_g_code_between_tenths_is_rejected() {
        let mut machine = Machine::default();
        assert_eq!(
            machine.run(&stmt(&[(Address::G, 1.04)])),
            Err(VmError::UnsupportedGCode { code: 1.04 })
        );
        assert_eq!(
            machine.run(&stmt(&[(Address::G, 90.05)])),
            Err(VmError::UnsupportedGCode { code: 90.05 })
        );
        assert_eq!(machine.state().move_mode, MoveMode::None);
        assert_eq!(machine.move_distance_mode(), DistanceMode::Absolute);
    }

    #[test]
    fn test_calc_pos_keeps_missing_axes() {
        let mut machine = Machine::default();
        machine
            .run(&stmt(&[
                (Address::G, 0.0),
                (Address::X, 1.0),
                (Address::Y, 2.0),
                (Address::Z, 3.0),
            ]))
            .unwrap();
        let target = machine.calc_pos(&stmt(&[(Address::Y, 5.0)])).unwrap();
        assert_eq!((target.x, target.y, target.z), (1.0, 5.0, 3.0));
        // Relative arc centers default to the current position
        assert_eq!((target.i, target.j, target.k), (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_calc_pos_relative_missing_axes_not_doubled() {
        let mut machine = Machine::default();
        machine
            .run(&stmt(&[(Address::G, 0.0), (Address::X, 4.0), (Address::Y, 4.0)]))
            .unwrap();
        machine.run(&stmt(&[(Address::G, 91.0)])).unwrap();
        let target = machine.calc_pos(&stmt(&[(Address::X, 1.0)])).unwrap();
        assert_eq!((target.x, target.y), (5.0, 4.0));
    }

    #[test]
    fn test_imperial_center_offsets() {
        let mut machine = Machine::default();
        machine.run(&stmt(&[(Address::G, 20.0)])).unwrap();
        let target = machine
            .calc_pos(&stmt(&[(Address::I, 1.0), (Address::J, 2.0), (Address::K, 0.5)]))
            .unwrap();
        assert!((target.i - 25.4).abs() < 1e-12);
        assert!((target.j - 50.8).abs() < 1e-12);
        assert!((target.k - 12.7).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_arc_turns() {
        let mut machine = Machine::default();
        let result = machine.run(&stmt(&[
            (Address::G, 2.0),
            (Address::X, 10.0),
            (Address::I, 5.0),
            (Address::P, 1.5),
        ]));
        assert_eq!(result, Err(VmError::InvalidArcTurns { value: 1.5 }));

        let result = machine.run(&stmt(&[
            (Address::G, 3.0),
            (Address::X, -10.0),
            (Address::I, -10.0),
            (Address::P, 1e11),
        ]));
        assert_eq!(result, Err(VmError::InvalidArcTurns { value: 1e11 }));
    }

    #[test]
    fn test_finalize_without_change_adds_nothing() {
        let mut machine = Machine::default();
        machine.finalize();
        assert_eq!(machine.positions().len(), 1);
    }
}
