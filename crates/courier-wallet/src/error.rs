//! Wallet error types.

use courier_core::DerivationCoordinate;
use thiserror::Error;

/// Errors from hierarchical key derivation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// The master extended private key could not be parsed.
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// The coordinate does not fit a non-hardened path level.
    #[error("invalid derivation coordinate {0}")]
    InvalidCoordinate(DerivationCoordinate),
}

/// Errors surfaced by the signing search.
///
/// Per-coordinate misses are absorbed by the search and never show up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Every candidate coordinate was tried and none produced a complete
    /// transaction.
    #[error("no candidate key authorized this artifact")]
    SigningExhausted {
        /// Number of coordinates attempted.
        tried: usize,
    },

    /// The transaction artifact could not be read from disk.
    #[error("cannot read transaction artifact {path}: {reason}")]
    ArtifactUnreadable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_exhausted() {
        let e = SigningError::SigningExhausted { tried: 21 };
        assert_eq!(e.to_string(), "no candidate key authorized this artifact");
    }

    #[test]
    fn display_invalid_coordinate() {
        let e = DerivationError::InvalidCoordinate(DerivationCoordinate::new(1 << 31, 0));
        assert_eq!(e.to_string(), "invalid derivation coordinate 2147483648/0");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = DerivationError::InvalidMasterKey("bad checksum".into());
        assert_eq!(e1.clone(), e1);
    }
}
