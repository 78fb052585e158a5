use cncvm_camtools::{optimize, GcodeExporter, OptimizerConfig, TraceOptimizer};
use cncvm_interpreter::{interpret, MoveMode, Position, VmConfig};

const THREE_SLOTS: &str = "\
G21 G90
M3 S10000
G0 Z5
G0 X50 Y0
G1 Z-1 F100
G1 X52
G0 Z5
G0 X10 Y0
G1 Z-1
G1 X12
G0 Z5
G0 X60 Y0
G1 Z-1
G1 X62
G0 Z5
G0 X0 Y0
M5
M2
";

fn trace(program: &str) -> Vec<Position> {
    interpret(program, VmConfig::default())
        .expect("program should interpret")
        .into_vec()
}

fn cut_starts(trace: &[Position]) -> Vec<f64> {
    trace
        .windows(2)
        .filter(|pair| {
            pair[0].state.move_mode == MoveMode::Rapid && pair[1].state.move_mode == MoveMode::Linear
        })
        .map(|pair| pair[0].x)
        .collect()
}

#[test]
fn test_routes_are_reordered_by_nearest_start() {
    let original = trace(THREE_SLOTS);
    assert_eq!(cut_starts(&original), vec![50.0, 10.0, 60.0]);

    let reordered = TraceOptimizer::reorder_routes(&original, 0.001);
    assert_eq!(reordered.len(), original.len());
    assert_eq!(cut_starts(&reordered), vec![10.0, 50.0, 60.0]);
    assert_eq!(reordered[0], original[0]);
    assert_eq!(reordered.last(), original.last());
}

#[test]
fn test_reorder_skipped_when_tooling_changes() {
    let program = THREE_SLOTS.replace("G0 X10 Y0\n", "G0 X10 Y0\nS5000\n");
    let original = trace(&program);
    let result = TraceOptimizer::reorder_routes(&original, 0.001);
    assert_eq!(result, original);
}

#[test]
fn test_reorder_skipped_when_travel_height_differs() {
    let program = THREE_SLOTS.replacen("G0 Z5\nG0 X60", "G0 Z8\nG0 X60", 1);
    let original = trace(&program);
    let result = TraceOptimizer::reorder_routes(&original, 0.001);
    assert_eq!(result, original);
}

#[test]
fn test_collinear_points_merge() {
    let original = trace("G1 X1 F100\nX2\nX3\nX4 Y0\nY5");
    let merged = TraceOptimizer::merge_collinear(&original, 0.001);
    let coords: Vec<[f64; 3]> = merged.iter().map(Position::coords).collect();
    assert_eq!(
        coords,
        vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 5.0, 0.0]]
    );
}

#[test]
fn test_arc_chords_survive_merging() {
    let original = trace("G0 X10\nG3 X-10 Y0 I-10 J0 F100");
    let merged = TraceOptimizer::merge_collinear(&original, 0.001);
    // Only the exact end point may fold into the last chord point
    assert!(merged.len() + 1 >= original.len());
    assert_eq!(merged.last().unwrap().coords(), [-10.0, 0.0, 0.0]);
}

#[test]
fn test_disabled_config_is_identity() {
    let original = trace(THREE_SLOTS);
    assert_eq!(optimize(&original, &OptimizerConfig::disabled()), original);
}

#[test]
fn test_optimized_export_reinterprets_to_same_cuts() {
    let original = trace(THREE_SLOTS);
    let optimized = optimize(&original, &OptimizerConfig::default());
    let program = GcodeExporter::default().export_program(&optimized);

    let replayed = trace(&program);
    let cuts = |t: &[Position]| -> Vec<[f64; 3]> {
        t.iter()
            .filter(|p| p.state.move_mode == MoveMode::Linear)
            .map(Position::coords)
            .collect()
    };
    assert_eq!(cuts(&replayed), cuts(&optimized));
    assert_eq!(cut_starts(&replayed), vec![10.0, 50.0, 60.0]);

    let last = replayed.last().unwrap();
    assert!(!last.state.spindle_enabled);
    assert_eq!(last.coords(), [0.0, 0.0, 5.0]);
}

#[test]
fn test_export_serializes_program_text() {
    let original = trace("M3 S1000\nG0 X1 Y2\nG1 Z-0.5 F250\nM5");
    let lines = GcodeExporter::default().export(&original);
    assert_eq!(
        lines,
        vec!["G21", "G90", "M3 S1000", "G0 X1 Y2", "G1 F250 Z-0.5", "M5", "M2"]
    );
}
