//! Error types for the external command boundary.
use std::time::Duration;

use thiserror::Error;

/// Failure of a single external command, as seen from inside the process.
///
/// Every way an external call can go wrong ends up here; nothing else
/// crosses the gateway boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The program could not be started at all.
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    /// The program ran and exited with a non-zero status.
    #[error("exit status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// The program exited cleanly but wrote to its error stream.
    #[error("error output: {0}")]
    Stderr(String),

    /// The program did not finish within its time budget.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl GatewayError {
    /// Text reported by the external program, or the rendered error for
    /// failures that happened before the program produced any.
    pub fn message(&self) -> String {
        match self {
            Self::NonZeroExit { stderr, .. } => stderr.clone(),
            Self::Stderr(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the outcome of the external call is unknown, as opposed to
    /// a definite rejection.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let e = GatewayError::Timeout(Duration::from_secs(60));
        assert_eq!(e.to_string(), "timed out after 60s");
    }

    #[test]
    fn display_non_zero_exit() {
        let e = GatewayError::NonZeroExit {
            code: Some(1),
            stderr: "boom".into(),
        };
        assert_eq!(e.to_string(), "exit status Some(1): boom");
    }

    #[test]
    fn message_prefers_program_text() {
        let e = GatewayError::NonZeroExit {
            code: Some(26),
            stderr: "insufficient fee".into(),
        };
        assert_eq!(e.message(), "insufficient fee");
        assert_eq!(GatewayError::Stderr("warn".into()).message(), "warn");
    }

    #[test]
    fn unresolved_only_for_timeout_and_spawn() {
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_unresolved());
        assert!(
            GatewayError::Spawn {
                program: "docker".into(),
                reason: "not found".into()
            }
            .is_unresolved()
        );
        assert!(!GatewayError::Stderr("x".into()).is_unresolved());
    }
}
