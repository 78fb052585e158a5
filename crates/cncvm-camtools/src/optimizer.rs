//! Trace Optimizer
//!
//! Shortens and simplifies an interpreter trace before it is exported.
//! Every pass takes the trace by reference and returns a new one; the
//! synthetic first position is never removed or moved.

use serde::{Deserialize, Serialize};

use cncvm_interpreter::{MachineState, MoveMode, Position};

use crate::error::{ParameterError, ParameterResult};

/// Which passes to run and how loosely points compare
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Drop entries identical to their predecessor
    pub remove_redundant: bool,
    /// Drop points lying on a straight line between their neighbours
    pub merge_collinear: bool,
    /// Turn feed moves that only raise Z into rapids
    pub promote_lifts: bool,
    /// Reorder independent cutting routes by nearest start
    pub reorder_routes: bool,
    /// Coordinate comparison tolerance in mm
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            remove_redundant: true,
            merge_collinear: true,
            promote_lifts: true,
            reorder_routes: true,
            tolerance: 0.001,
        }
    }
}

impl OptimizerConfig {
    /// Configuration with every pass disabled
    pub fn disabled() -> Self {
        Self {
            remove_redundant: false,
            merge_collinear: false,
            promote_lifts: false,
            reorder_routes: false,
            ..Self::default()
        }
    }

    /// Check the tolerance is usable
    pub fn validate(&self) -> ParameterResult<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ParameterError::InvalidValue {
                name: "tolerance".to_string(),
                reason: format!("must be a positive number, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Trace optimization passes
#[derive(Debug)]
pub struct TraceOptimizer;

impl TraceOptimizer {
    /// Remove entries that repeat their predecessor in both coordinates and
    /// state
    pub fn remove_redundant(trace: &[Position], tolerance: f64) -> Vec<Position> {
        let mut result: Vec<Position> = Vec::with_capacity(trace.len());

        for position in trace {
            if let Some(last) = result.last() {
                if position.state == last.state && position.same_coords(last, tolerance) {
                    continue;
                }
            }
            result.push(*position);
        }

        result
    }

    /// Remove middle points of straight runs
    ///
    /// A point is dropped when the moves into and out of it share a state,
    /// that state is rapid or linear, and the point lies on the segment
    /// joining its neighbours.
    pub fn merge_collinear(trace: &[Position], tolerance: f64) -> Vec<Position> {
        let mut result: Vec<Position> = Vec::with_capacity(trace.len());

        for position in trace {
            while result.len() >= 2 {
                let middle = result[result.len() - 1];
                let before = result[result.len() - 2];
                let straight = matches!(middle.state.move_mode, MoveMode::Rapid | MoveMode::Linear)
                    && middle.state == position.state
                    && on_segment(&before, &middle, position, tolerance);
                if !straight {
                    break;
                }
                result.pop();
            }
            result.push(*position);
        }

        result
    }

    /// Turn linear moves that only raise Z into rapids
    pub fn promote_lifts(trace: &[Position], tolerance: f64) -> Vec<Position> {
        let mut result = trace.to_vec();

        for i in 1..result.len() {
            let previous = trace[i - 1];
            let current = &mut result[i];
            let lift = current.state.move_mode == MoveMode::Linear
                && (current.x - previous.x).abs() <= tolerance
                && (current.y - previous.y).abs() <= tolerance
                && current.z > previous.z + tolerance;
            if lift {
                current.state.move_mode = MoveMode::Rapid;
            }
        }

        result
    }

    /// Reorder cutting routes by nearest start point
    ///
    /// A route is a run of feed moves entered from a rapid hover point and
    /// left by a rapid lift straight above its last point. Routes are only
    /// reordered when all of them hover and lift at one common travel
    /// height, everything between them is rapid travel at that height, and
    /// the spindle and coolant never change across them. The greedy order is
    /// kept only if it travels less than the original one.
    pub fn reorder_routes(trace: &[Position], tolerance: f64) -> Vec<Position> {
        let routes = match find_routes(trace, tolerance) {
            Ok(routes) => routes,
            Err(reason) => {
                tracing::debug!(reason, "route reordering skipped");
                return trace.to_vec();
            }
        };
        if routes.len() < 2 {
            return trace.to_vec();
        }

        let first_hover = routes[0].hover;
        let last_lift = routes[routes.len() - 1].lift;
        let origin = trace[first_hover - 1];

        let original: Vec<usize> = (0..routes.len()).collect();
        let greedy = nearest_first(trace, &routes, &origin);

        let original_travel = travel_length(trace, &routes, &original, &origin);
        let greedy_travel = travel_length(trace, &routes, &greedy, &origin);
        if greedy_travel + tolerance >= original_travel {
            return trace.to_vec();
        }

        tracing::debug!(
            routes = routes.len(),
            original_travel,
            greedy_travel,
            "routes reordered"
        );

        let mut result = Vec::with_capacity(trace.len());
        result.extend_from_slice(&trace[..first_hover]);
        for &index in &greedy {
            let route = &routes[index];
            result.extend_from_slice(&trace[route.hover..=route.lift]);
        }
        result.extend_from_slice(&trace[last_lift + 1..]);
        result
    }

    /// Run the enabled passes: reorder, lifts, collinear, redundant
    pub fn optimize(trace: &[Position], config: &OptimizerConfig) -> Vec<Position> {
        let mut optimized = trace.to_vec();
        if config.reorder_routes {
            optimized = Self::reorder_routes(&optimized, config.tolerance);
        }
        if config.promote_lifts {
            optimized = Self::promote_lifts(&optimized, config.tolerance);
        }
        if config.merge_collinear {
            optimized = Self::merge_collinear(&optimized, config.tolerance);
        }
        if config.remove_redundant {
            optimized = Self::remove_redundant(&optimized, config.tolerance);
        }

        tracing::debug!(
            before = trace.len(),
            after = optimized.len(),
            "trace optimized"
        );
        optimized
    }
}

/// Optimize a trace with the given configuration
pub fn optimize(trace: &[Position], config: &OptimizerConfig) -> Vec<Position> {
    TraceOptimizer::optimize(trace, config)
}

/// Indices of one cutting route: its hover point and its lift, inclusive
#[derive(Debug, Clone, Copy)]
struct Route {
    hover: usize,
    lift: usize,
}

fn is_cut(position: &Position) -> bool {
    !matches!(position.state.move_mode, MoveMode::None | MoveMode::Rapid)
}

fn same_tooling(a: &MachineState, b: &MachineState) -> bool {
    a.spindle_enabled == b.spindle_enabled
        && a.spindle_clockwise == b.spindle_clockwise
        && a.spindle_speed == b.spindle_speed
        && a.flood_coolant == b.flood_coolant
        && a.mist_coolant == b.mist_coolant
}

fn find_routes(trace: &[Position], tolerance: f64) -> Result<Vec<Route>, &'static str> {
    let mut routes: Vec<Route> = Vec::new();
    let mut height: Option<f64> = None;
    let mut i = 1;

    while i < trace.len() {
        if !is_cut(&trace[i]) {
            i += 1;
            continue;
        }

        let hover = i - 1;
        while i < trace.len() && is_cut(&trace[i]) {
            i += 1;
        }
        let last_cut = trace[i - 1];

        if hover == 0 || trace[hover].state.move_mode != MoveMode::Rapid {
            return Err("route not entered by a rapid move");
        }
        let travel = *height.get_or_insert(trace[hover].z);
        if (trace[hover].z - travel).abs() > tolerance {
            return Err("routes hover at different heights");
        }

        let lift = trace.get(i).ok_or("route not followed by a lift")?;
        let straight_up = lift.state.move_mode == MoveMode::Rapid
            && (lift.x - last_cut.x).abs() <= tolerance
            && (lift.y - last_cut.y).abs() <= tolerance
            && (lift.z - travel).abs() <= tolerance;
        if !straight_up {
            return Err("route not followed by a lift to travel height");
        }

        if let Some(previous) = routes.last() {
            let between = &trace[previous.lift + 1..hover];
            let at_height = between.iter().all(|p| {
                p.state.move_mode == MoveMode::Rapid && (p.z - travel).abs() <= tolerance
            });
            if !at_height {
                return Err("travel between routes leaves travel height");
            }
        }

        routes.push(Route { hover, lift: i });
        i += 1;
    }

    if let (Some(first), Some(last)) = (routes.first(), routes.last()) {
        let reference = trace[first.hover].state;
        if !trace[first.hover..=last.lift]
            .iter()
            .all(|p| same_tooling(&p.state, &reference))
        {
            return Err("spindle or coolant changes between routes");
        }
    }

    Ok(routes)
}

fn planar_distance(a: &Position, b: &Position) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

fn nearest_first(trace: &[Position], routes: &[Route], origin: &Position) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..routes.len()).collect();
    let mut order = Vec::with_capacity(routes.len());
    let mut current = *origin;

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (slot, &index) in remaining.iter().enumerate() {
            let distance = planar_distance(&current, &trace[routes[index].hover]);
            if distance < best_distance {
                best = slot;
                best_distance = distance;
            }
        }
        let index = remaining.remove(best);
        current = trace[routes[index].lift];
        order.push(index);
    }

    order
}

fn travel_length(trace: &[Position], routes: &[Route], order: &[usize], origin: &Position) -> f64 {
    let mut current = *origin;
    let mut total = 0.0;
    for &index in order {
        total += planar_distance(&current, &trace[routes[index].hover]);
        current = trace[routes[index].lift];
    }
    total
}

/// Whether `middle` lies on the segment from `start` to `end`
fn on_segment(start: &Position, middle: &Position, end: &Position, tolerance: f64) -> bool {
    let [sx, sy, sz] = start.coords();
    let [mx, my, mz] = middle.coords();
    let [ex, ey, ez] = end.coords();

    let (dx, dy, dz) = (ex - sx, ey - sy, ez - sz);
    let length_sq = dx * dx + dy * dy + dz * dz;
    if length_sq <= tolerance * tolerance {
        return middle.same_coords(start, tolerance);
    }

    let t = ((mx - sx) * dx + (my - sy) * dy + (mz - sz) * dz) / length_sq;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }

    let (px, py, pz) = (sx + t * dx, sy + t * dy, sz + t * dz);
    let offset = ((mx - px).powi(2) + (my - py).powi(2) + (mz - pz).powi(2)).sqrt();
    offset <= tolerance
}
