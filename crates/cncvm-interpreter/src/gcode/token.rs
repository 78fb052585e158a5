//! Address/value tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// Word address letter
///
/// The interpreter understands a fixed alphabet; anything else is rejected
/// by the parser before it reaches the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// Preparatory command
    G,
    /// Miscellaneous command
    M,
    /// Feedrate
    F,
    /// Spindle speed
    S,
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
    /// Arc center offset along X
    I,
    /// Arc center offset along Y
    J,
    /// Arc center offset along Z
    K,
    /// Parameter (extra arc turns)
    P,
}

impl Address {
    /// Map an address letter (case-insensitive) to its address
    pub fn from_letter(letter: char) -> Option<Self> {
        let address = match letter.to_ascii_uppercase() {
            'G' => Self::G,
            'M' => Self::M,
            'F' => Self::F,
            'S' => Self::S,
            'X' => Self::X,
            'Y' => Self::Y,
            'Z' => Self::Z,
            'I' => Self::I,
            'J' => Self::J,
            'K' => Self::K,
            'P' => Self::P,
            _ => return None,
        };
        Some(address)
    }

    /// The upper-case letter for this address
    pub fn letter(self) -> char {
        match self {
            Self::G => 'G',
            Self::M => 'M',
            Self::F => 'F',
            Self::S => 'S',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::I => 'I',
            Self::J => 'J',
            Self::K => 'K',
            Self::P => 'P',
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A single word of a program line, e.g. `X10.5`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Address letter
    pub address: Address,
    /// Numeric value
    pub value: f64,
}

impl Token {
    /// Create a new token
    pub fn new(address: Address, value: f64) -> Self {
        Self { address, value }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.address, self.value)
    }
}
