//! Classification of `sendrawtransaction` results.
//!
//! A correctly signed transaction can still be turned away by the node for
//! reasons that say nothing about the signature: the fee is below relay
//! policy, or the node already has it. Those are benign and keep the signed
//! hex; any other rejection counts against the key that produced it. This
//! is the only place that reads the node's rejection text.

use std::fmt;

use serde::{Deserialize, Serialize};

use courier_core::constants::{TXID_PENDING, TXID_UNKNOWN};
use courier_core::{GatewayError, Outcome};

/// Rejection texts that leave a valid, signed transaction behind.
const BENIGN_REJECTIONS: &[&str] = &[
    "insufficient fee",
    "already in mempool",
    "txn-already-in-mempool",
    "txn-already-known",
    "rejecting replacement",
];

/// Transaction id as far as this run could establish it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TransactionId {
    /// Id returned by the node on acceptance.
    Broadcast(String),
    /// The node refused this submission for a benign reason.
    Pending,
    /// The submission's fate is unknown.
    Unknown,
}

impl TransactionId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Broadcast(txid) => txid,
            Self::Pending => TXID_PENDING,
            Self::Unknown => TXID_UNKNOWN,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Broadcast(_))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.as_str().to_string()
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        match s.as_str() {
            TXID_PENDING => Self::Pending,
            TXID_UNKNOWN => Self::Unknown,
            _ => Self::Broadcast(s),
        }
    }
}

/// Result of submitting one signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The node accepted the transaction.
    Accepted { txid: String },
    /// Not accepted, but the signed transaction is valid. Carries a sentinel id.
    Benign { txid: TransactionId, warning: String },
    /// Rejected for a reason that implicates the signing key.
    Rejected { reason: String },
}

impl Submission {
    /// Whether the search may stop on this result.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Classify the raw outcome of a submit call.
pub fn classify(outcome: Outcome) -> Submission {
    match outcome {
        Ok(txid) if !txid.is_empty() => Submission::Accepted { txid },
        Ok(_) => Submission::Benign {
            txid: TransactionId::Unknown,
            warning: "node accepted the transaction without reporting an id".into(),
        },
        Err(e) if e.is_unresolved() => Submission::Benign {
            txid: TransactionId::Unknown,
            warning: format!("broadcast uncertain, signed hex available: {e}"),
        },
        Err(e) => classify_rejection(&e),
    }
}

fn classify_rejection(e: &GatewayError) -> Submission {
    let text = e.message();
    let lowered = text.to_ascii_lowercase();
    match BENIGN_REJECTIONS.iter().find(|needle| lowered.contains(*needle)) {
        Some(matched) => Submission::Benign {
            txid: TransactionId::Pending,
            warning: format!("broadcast refused ({matched}) but transaction is signed: {text}"),
        },
        None => Submission::Rejected { reason: text },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn rejected(stderr: &str) -> Outcome {
        Err(GatewayError::NonZeroExit {
            code: Some(26),
            stderr: stderr.into(),
        })
    }

    #[test]
    fn accepted_returns_txid() {
        assert_eq!(
            classify(Ok("abc123".into())),
            Submission::Accepted {
                txid: "abc123".into()
            }
        );
    }

    #[test]
    fn insufficient_fee_is_benign_pending() {
        let s = classify(rejected("error code: -26\nerror message:\nmin relay fee not met, insufficient fee"));
        match s {
            Submission::Benign { txid, warning } => {
                assert_eq!(txid, TransactionId::Pending);
                assert!(warning.contains("insufficient fee"));
            }
            other => panic!("expected benign, got {other:?}"),
        }
    }

    #[test]
    fn mempool_duplicates_are_benign() {
        for msg in ["txn-already-in-mempool", "Transaction already in mempool", "txn-already-known"] {
            assert!(
                matches!(classify(rejected(msg)), Submission::Benign { txid: TransactionId::Pending, .. }),
                "{msg}"
            );
        }
    }

    #[test]
    fn replacement_rejection_is_benign() {
        assert!(classify(rejected("insufficient fee, rejecting replacement abcd")).is_success());
        assert!(classify(rejected("rejecting replacement 00ff")).is_success());
    }

    #[test]
    fn other_rejection_is_rejected() {
        let s = classify(rejected("bad-txns-inputs-missingorspent"));
        assert_eq!(
            s,
            Submission::Rejected {
                reason: "bad-txns-inputs-missingorspent".into()
            }
        );
        assert!(!s.is_success());
    }

    #[test]
    fn timeout_is_benign_unknown() {
        let s = classify(Err(GatewayError::Timeout(Duration::from_secs(60))));
        assert!(matches!(s, Submission::Benign { txid: TransactionId::Unknown, .. }));
    }

    #[test]
    fn empty_output_is_unknown() {
        assert!(matches!(
            classify(Ok(String::new())),
            Submission::Benign { txid: TransactionId::Unknown, .. }
        ));
    }

    #[test]
    fn transaction_id_string_forms() {
        assert_eq!(TransactionId::Pending.to_string(), "pending");
        assert_eq!(TransactionId::Unknown.to_string(), "unknown");
        assert_eq!(TransactionId::from("abc".to_string()), TransactionId::Broadcast("abc".into()));
        assert!(TransactionId::Pending.is_sentinel());
        assert!(!TransactionId::Broadcast("x".into()).is_sentinel());

        let json = serde_json::to_string(&TransactionId::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
