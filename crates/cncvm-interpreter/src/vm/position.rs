//! Resolved positions and the append-only trace

use serde::{Deserialize, Serialize};
use std::ops::Index;

use super::MachineState;

/// A resolved point in absolute machine coordinates (mm) and the state it
/// was reached with
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Modal state when this point was reached
    pub state: MachineState,
    /// X in mm
    pub x: f64,
    /// Y in mm
    pub y: f64,
    /// Z in mm
    pub z: f64,
}

impl Position {
    /// Create a position
    pub fn new(state: MachineState, x: f64, y: f64, z: f64) -> Self {
        Self { state, x, y, z }
    }

    /// Coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether both positions share coordinates within `tolerance` per axis
    pub fn same_coords(&self, other: &Position, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }
}

/// Ordered trace of everything the machine did
///
/// Always starts with one synthetic position at the origin carrying the
/// default state. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStack {
    positions: Vec<Position>,
}

impl PositionStack {
    /// Create a stack seeded with the origin
    pub fn new() -> Self {
        Self {
            positions: vec![Position::default()],
        }
    }

    /// Append a position
    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// Most recent position
    pub fn top(&self) -> &Position {
        // The seed entry is never removed.
        &self.positions[self.positions.len() - 1]
    }

    /// Number of entries, including the seed
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All entries in order
    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }

    /// Iterate over entries
    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.positions.iter()
    }

    /// Consume the stack into its entries
    pub fn into_vec(self) -> Vec<Position> {
        self.positions
    }
}

impl Default for PositionStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for PositionStack {
    type Output = Position;

    fn index(&self, index: usize) -> &Position {
        &self.positions[index]
    }
}

impl<'a> IntoIterator for &'a PositionStack {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter()
    }
}
