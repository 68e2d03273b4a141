//! Transfer error types.

use std::path::PathBuf;

use courier_core::GatewayError;
use courier_wallet::SigningError;
use thiserror::Error;

use crate::stage::Stage;

/// Reasons an orchestration run ends in FAILED.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// A single-shot protocol step returned an error.
    #[error("{stage} failed: {source}")]
    Gateway {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    /// The transfer step reported success but an artifact is not on disk.
    #[error("artifact missing after transfer creation: {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// No candidate key produced a complete transaction, or the artifact
    /// could not be read.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A stage was entered from somewhere other than its predecessor.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },

    /// The result record could not be written.
    #[error("result record: {0}")]
    Record(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_gateway() {
        let e = TransferError::Gateway {
            stage: Stage::Validated,
            source: GatewayError::Stderr("invalid consignment".into()),
        };
        assert_eq!(e.to_string(), "VALIDATED failed: error output: invalid consignment");
    }

    #[test]
    fn display_artifact_missing() {
        let e = TransferError::ArtifactMissing(PathBuf::from("/w/t.psbt"));
        assert_eq!(e.to_string(), "artifact missing after transfer creation: /w/t.psbt");
    }

    #[test]
    fn from_signing_error() {
        let e: TransferError = SigningError::SigningExhausted { tried: 3 }.into();
        assert_eq!(e.to_string(), "no candidate key authorized this artifact");
    }

    #[test]
    fn display_illegal_transition() {
        let e = TransferError::IllegalTransition {
            from: Stage::Start,
            to: Stage::Signed,
        };
        assert_eq!(e.to_string(), "illegal transition START -> SIGNED");
    }
}
