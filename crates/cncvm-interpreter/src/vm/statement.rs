//! Statement lookup

use crate::error::{VmError, VmResult};
use crate::gcode::{Address, Block, Token};

/// The words of one program line as seen by the machine
///
/// Coordinates (X/Y/Z/I/J/K/P) are single-valued and must be unambiguous,
/// while command and mode words (G/M/F/S) may repeat and are applied in the
/// order they were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    tokens: Vec<Token>,
}

impl Statement {
    /// Create a statement from tokens in source order
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// The tokens of this statement
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Single value for `address`
    ///
    /// Fails when the address is missing or appears more than once.
    pub fn get(&self, address: Address) -> VmResult<f64> {
        let mut found = self.values(address);
        match (found.next(), found.next()) {
            (Some(value), None) => Ok(value),
            _ => Err(VmError::AmbiguousOrMissingField {
                address,
                count: self.values(address).count(),
            }),
        }
    }

    /// Single value for `address`, or `default` when it cannot be resolved
    pub fn get_default(&self, address: Address, default: f64) -> f64 {
        self.get(address).unwrap_or(default)
    }

    /// Every value for `address`, in source order
    pub fn get_all(&self, address: Address) -> Vec<f64> {
        self.values(address).collect()
    }

    /// Whether any of `addresses` appears on the line
    pub fn includes(&self, addresses: &[Address]) -> bool {
        self.tokens.iter().any(|t| addresses.contains(&t.address))
    }

    /// Value for `address` if present, failing when it is ambiguous
    pub(crate) fn get_optional(&self, address: Address) -> VmResult<Option<f64>> {
        if self.includes(&[address]) {
            self.get(address).map(Some)
        } else {
            Ok(None)
        }
    }

    fn values(&self, address: Address) -> impl Iterator<Item = f64> + '_ {
        self.tokens
            .iter()
            .filter(move |t| t.address == address)
            .map(|t| t.value)
    }
}

impl From<&Block> for Statement {
    fn from(block: &Block) -> Self {
        Self::new(block.tokens.clone())
    }
}

impl FromIterator<Token> for Statement {
    fn from_iter<T: IntoIterator<Item = Token>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(words: &[(Address, f64)]) -> Statement {
        words.iter().map(|&(a, v)| Token::new(a, v)).collect()
    }

    #[test]
    fn test_get_single() {
        let stmt = statement(&[(Address::G, 1.0), (Address::X, 4.0)]);
        assert_eq!(stmt.get(Address::X), Ok(4.0));
    }

    #[test]
    fn test_get_missing_and_ambiguous() {
        let stmt = statement(&[(Address::X, 1.0), (Address::X, 2.0)]);
        assert_eq!(
            stmt.get(Address::X),
            Err(VmError::AmbiguousOrMissingField {
                address: Address::X,
                count: 2
            })
        );
        assert_eq!(
            stmt.get(Address::Y),
            Err(VmError::AmbiguousOrMissingField {
                address: Address::Y,
                count: 0
            })
        );
    }

    #[test]
    fn test_get_default() {
        let stmt = statement(&[(Address::P, 2.0)]);
        assert_eq!(stmt.get_default(Address::P, 0.0), 2.0);
        assert_eq!(stmt.get_default(Address::K, 7.5), 7.5);
    }

    #[test]
    fn test_get_all_keeps_order() {
        let stmt = statement(&[
            (Address::G, 90.0),
            (Address::X, 1.0),
            (Address::G, 1.0),
            (Address::G, 21.0),
        ]);
        assert_eq!(stmt.get_all(Address::G), vec![90.0, 1.0, 21.0]);
        assert!(stmt.get_all(Address::M).is_empty());
    }

    #[test]
    fn test_includes() {
        let stmt = statement(&[(Address::G, 0.0), (Address::Z, 5.0)]);
        assert!(stmt.includes(&[Address::X, Address::Y, Address::Z]));
        assert!(!stmt.includes(&[Address::X, Address::Y]));
        assert!(!stmt.includes(&[]));
    }

    #[test]
    fn test_get_optional() {
        let stmt = statement(&[(Address::I, 1.0), (Address::J, 1.0), (Address::J, 2.0)]);
        assert_eq!(stmt.get_optional(Address::I), Ok(Some(1.0)));
        assert_eq!(stmt.get_optional(Address::K), Ok(None));
        assert!(stmt.get_optional(Address::J).is_err());
    }
}
