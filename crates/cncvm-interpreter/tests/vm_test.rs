use cncvm_interpreter::vm::{self, DistanceMode, MachineState, MoveMode, VmConfig};
use cncvm_interpreter::{interpret, parse, Address, BlockError, InterpretError, Machine, VmError};

fn trace(program: &str) -> Vec<vm::Position> {
    interpret(program, VmConfig::default())
        .expect("program should interpret")
        .into_vec()
}

fn failure(program: &str) -> BlockError {
    match interpret(program, VmConfig::default()) {
        Err(InterpretError::Block(err)) => err,
        other => panic!("expected a block error, got {:?}", other),
    }
}

#[test]
fn test_trace_starts_with_origin() {
    let positions = trace("G0 X5 Y5\nG1 Z-1 F100\nM2");
    assert!(!positions.is_empty());
    assert_eq!(positions[0], vm::Position::default());
    assert_eq!(positions[0].state, MachineState::default());
}

#[test]
fn test_empty_program_has_seed_only() {
    let positions = trace("");
    assert_eq!(positions.len(), 1);
}

#[test]
fn test_imperial_units() {
    let positions = trace("G20\nG0 X1");
    assert!((positions[1].x - 25.4).abs() < 1e-12);
}

#[test]
fn test_imperial_feedrate_is_normalized() {
    let positions = trace("G20\nG1 X1 F10");
    assert!((positions[1].state.feedrate - 254.0).abs() < 1e-9);
}

#[test]
fn test_relative_moves_accumulate() {
    let positions = trace("G91\nG1 X1 F100\nX1");
    assert_eq!(positions[1].x, 1.0);
    assert_eq!(positions[2].x, 2.0);
}

#[test]
fn test_absolute_moves_do_not_accumulate() {
    let positions = trace("G90\nG1 X1 F100\nX1");
    assert_eq!(positions[1].x, 1.0);
    assert_eq!(positions[2].x, 1.0);
}

#[test]
fn test_arc_mode_independent_of_move_mode() {
    // Linear axes relative, arc centers absolute
    let document = parse("G0 X10 Y10\nG91 G90.1").unwrap();
    let mut machine = Machine::default();
    machine.process(&document).unwrap();
    assert_eq!(machine.move_distance_mode(), DistanceMode::Relative);
    assert_eq!(machine.arc_distance_mode(), DistanceMode::Absolute);

    let stmt = parse("X5 I3 J4").unwrap().blocks[0].clone();
    let target = machine.calc_pos(&(&stmt).into()).unwrap();
    assert_eq!((target.x, target.y), (15.0, 10.0));
    assert_eq!((target.i, target.j), (3.0, 4.0));

    // And the default: relative centers with absolute axes
    let mut machine = Machine::default();
    machine.process(&parse("G0 X10 Y10").unwrap()).unwrap();
    let stmt = parse("X5 I3 J4").unwrap().blocks[0].clone();
    let target = machine.calc_pos(&(&stmt).into()).unwrap();
    assert_eq!((target.x, target.y), (5.0, 10.0));
    assert_eq!((target.i, target.j), (13.0, 14.0));
}

#[test]
fn test_relative_arc_with_absolute_centers() {
    // Start at (10, 0), center given absolutely at the origin, end 10 units
    // back along X and up along Y in relative terms.
    let positions = trace("G0 X10\nG91 G90.1\nG3 X-10 Y10 I0 J0 F100");
    let last = positions.last().unwrap();
    assert!((last.x - 0.0).abs() < 1e-9);
    assert!((last.y - 10.0).abs() < 1e-9);
    for p in &positions[2..] {
        assert!((p.x.hypot(p.y) - 10.0).abs() < 1e-6);
    }
}

#[test]
fn test_no_active_move_mode() {
    let err = failure("X1");
    assert_eq!(err.source, VmError::NoActiveMoveMode);
    assert_eq!(err.line_number, 1);

    let err = failure("G1 X1 F100\nG80\nY2");
    assert_eq!(err.source, VmError::NoActiveMoveMode);
    assert_eq!(err.line_number, 3);
}

#[test]
fn test_feedrate_validation() {
    assert_eq!(
        failure("F0").source,
        VmError::InvalidFeedrate { value: 0.0 }
    );
    assert_eq!(
        failure("F-1").source,
        VmError::InvalidFeedrate { value: -1.0 }
    );

    let document = parse("F100").unwrap();
    let mut machine = Machine::default();
    machine.process(&document).unwrap();
    assert_eq!(machine.state().feedrate, 100.0);
}

#[test]
fn test_spindle_speed_validation() {
    assert_eq!(
        failure("S-1").source,
        VmError::InvalidSpindleSpeed { value: -1.0 }
    );

    let document = parse("S1000").unwrap();
    let mut machine = Machine::default();
    machine.process(&document).unwrap();
    assert_eq!(machine.state().spindle_speed, 1000.0);

    let mut machine = Machine::default();
    machine.process(&parse("S0").unwrap()).unwrap();
    assert_eq!(machine.state().spindle_speed, 0.0);
}

#[test]
fn test_ambiguous_axis() {
    let err = failure("G1 X1 X2 F100");
    assert_eq!(
        err.source,
        VmError::AmbiguousOrMissingField {
            address: Address::X,
            count: 2
        }
    );
}

#[test]
fn test_repeated_codes_all_apply() {
    let document = parse("G21 G91 G1 M3 M8 F50 F75 S100 S200").unwrap();
    let mut machine = Machine::default();
    machine.process(&document).unwrap();
    let state = machine.state();
    assert_eq!(state.feedrate, 75.0);
    assert_eq!(state.spindle_speed, 200.0);
    assert!(state.spindle_enabled && state.flood_coolant);
}

#[test]
fn test_codes_apply_before_motion_regardless_of_order() {
    let positions = trace("X3 F200 G1");
    assert_eq!(positions[1].x, 3.0);
    assert_eq!(positions[1].state.move_mode, MoveMode::Linear);
    assert_eq!(positions[1].state.feedrate, 200.0);
}

#[test]
fn test_spindle_and_coolant_codes() {
    let document = parse("M4\nM7\nM8").unwrap();
    let mut machine = Machine::default();
    machine.process(&document).unwrap();
    let state = *machine.state();
    assert!(state.spindle_enabled);
    assert!(!state.spindle_clockwise);
    assert!(state.mist_coolant && state.flood_coolant);

    machine.process(&parse("M9 M5").unwrap()).unwrap();
    let state = machine.state();
    assert!(!state.spindle_enabled);
    assert!(!state.mist_coolant && !state.flood_coolant);
}

#[test]
fn test_arc_leaves_linear_mode() {
    let positions = trace("G0 X10\nG3 X0 Y10 I-10 J0 F100\nX0 Y20");
    let last = positions.last().unwrap();
    assert_eq!(last.coords(), [0.0, 20.0, 0.0]);
    assert!(positions[2..]
        .iter()
        .all(|p| p.state.move_mode == MoveMode::Linear));
}

#[test]
fn test_statements_after_end_are_no_ops() {
    let positions = trace("G0 X1\nM2\nG0 X50\nF-5\nM6");
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[1].x, 1.0);
}

#[test]
fn test_block_delete_is_skipped() {
    let positions = trace("G0 X1\n/G0 X99\nG0 Y2");
    assert_eq!(positions.len(), 3);
    assert_eq!(positions[2].x, 1.0);
    assert_eq!(positions[2].y, 2.0);
}

#[test]
fn test_finalize_records_trailing_spindle_off() {
    let positions = trace("M3 S1000\nG1 X5 F100\nM5");
    let n = positions.len();
    let last = positions[n - 1];
    let previous = positions[n - 2];

    assert!(!last.state.spindle_enabled);
    assert!(previous.state.spindle_enabled);
    assert_ne!(last.state, previous.state);
    assert_eq!(last.coords(), previous.coords());
    assert_eq!(last.state.move_mode, MoveMode::None);
}

#[test]
fn test_error_keeps_earlier_statements() {
    let document = parse("G0 X1\nG0 X2\nG4 P1\nG0 X3").unwrap();
    let mut machine = Machine::default();
    let err = machine.process(&document).unwrap_err();
    assert_eq!(err.line_number, 3);
    assert_eq!(err.source, VmError::UnsupportedGCode { code: 4.0 });
    assert_eq!(machine.positions().len(), 3);
    assert_eq!(machine.positions().top().x, 2.0);
}

#[test]
fn test_trace_serializes() {
    let stack = interpret("G1 X1 F100", VmConfig::default()).unwrap();
    let json = serde_json::to_string(&stack).unwrap();
    assert!(json.contains("\"move_mode\":\"linear\""));
}

#[test]
fn test_g_code_between_tenths_is_unsupported() {
    let err = failure("G1.04 X5 F100");
    assert_eq!(err.source, VmError::UnsupportedGCode { code: 1.04 });

    let err = failure("G0 X1\nG90.05 X2");
    assert_eq!(err.line_number, 2);
    assert_eq!(err.source, VmError::UnsupportedGCode { code: 90.05 });
}

#[test]
fn test_huge_turn_count_is_an_error() {
    let err = failure("G0 X10\nG3 X-10 I-10 P100000000000");
    assert_eq!(err.line_number, 2);
    assert_eq!(err.source, VmError::InvalidArcTurns { value: 1e11 });

    let err = failure("G0 X10\nG3 X-10 I-10 P100000");
    assert!(matches!(
        err.source,
        VmError::TooManyArcSegments { limit: 200_000, .. }
    ));
}
