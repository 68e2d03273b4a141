//! The result record written once per orchestration run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_core::{ArtifactPaths, DerivationCoordinate, TransferRequest};
use courier_wallet::TransactionId;

use crate::error::TransferError;
use crate::reconcile::Verification;
use crate::stage::{Stage, TransferState};

/// Persisted summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// The run reached DONE.
    pub success: bool,
    /// Reconciliation found the transferred amount.
    pub verified: bool,
    pub final_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub invoice: Option<String>,
    pub transfer_amount: u64,
    pub contract_id: String,
    pub transaction_hex: Option<String>,
    /// Real id or `pending` / `unknown`.
    pub transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_coordinate: Option<DerivationCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    /// Artifact paths produced during the run (removed at teardown).
    pub files_created: ArtifactPaths,
}

impl ResultRecord {
    pub fn from_run(request: &TransferRequest, state: &TransferState, started: DateTime<Utc>) -> Self {
        let signed = state.signed();
        Self {
            timestamp: started,
            success: state.stage() == Stage::Done,
            verified: state.verification().is_some_and(Verification::is_confirmed),
            final_stage: state.stage(),
            error: state.error().map(ToString::to_string),
            invoice: state.invoice().map(str::to_string),
            transfer_amount: request.amount,
            contract_id: request.contract_id.clone(),
            transaction_hex: signed.map(|s| s.hex.clone()),
            transaction_id: state.transaction_id().cloned(),
            signing_coordinate: signed.map(|s| s.coordinate),
            verification: state.verification().cloned(),
            files_created: request.artifacts.clone(),
        }
    }

    /// File name derived from the run timestamp.
    pub fn file_name(&self) -> String {
        format!("rgb_transfer_result_{}.json", self.timestamp.format("%Y%m%d_%H%M%S"))
    }
}

/// Destination for result records.
#[cfg_attr(test, mockall::automock)]
pub trait RecordSink: Send + Sync {
    /// Store `record`, returning where it went.
    fn persist(&self, record: &ResultRecord) -> Result<PathBuf, TransferError>;
}

/// Writes pretty-printed JSON files into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RecordSink for JsonFileSink {
    fn persist(&self, record: &ResultRecord) -> Result<PathBuf, TransferError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| TransferError::Record(e.to_string()))?;
        let path = self.dir.join(record.file_name());
        let json = serde_json::to_string_pretty(record).map_err(|e| TransferError::Record(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| TransferError::Record(e.to_string()))?;
        info!(path = %path.display(), "result record saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use courier_core::Network;
    use courier_wallet::SignedTransaction;

    use super::*;

    fn request(dir: &std::path::Path) -> TransferRequest {
        TransferRequest {
            sender_dir: dir.join(".alice"),
            receiver_dir: dir.join(".bob"),
            signing_wallet: "alice_legacy".into(),
            contract_id: "rgb:abc".into(),
            interface: "RGB20Fixed".into(),
            amount: 500,
            network: Network::Regtest,
            artifacts: ArtifactPaths::timestamped(dir, "t"),
        }
    }

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn record_from_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let mut state = TransferState::new();
        state.fail(TransferError::Record("boom".into()));

        let rec = ResultRecord::from_run(&req, &state, started());
        assert!(!rec.success);
        assert!(!rec.verified);
        assert_eq!(rec.final_stage, Stage::Failed);
        assert_eq!(rec.error.as_deref(), Some("result record: boom"));
        assert_eq!(rec.transaction_id, None);
        assert_eq!(rec.files_created, req.artifacts);
    }

    #[test]
    fn record_from_done_run() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let mut state = TransferState::new();
        for stage in [
            Stage::Invoiced,
            Stage::Packaged,
            Stage::Validated,
            Stage::Accepted,
            Stage::Signed,
            Stage::Reconciled,
            Stage::Done,
        ] {
            state.advance(stage, "").unwrap();
        }
        state.set_invoice("rgb:inv-1".into());
        state.set_signed(SignedTransaction {
            txid: TransactionId::Pending,
            hex: "0200".into(),
            coordinate: DerivationCoordinate::new(9, 1),
            warning: Some("fee".into()),
        });
        state.set_verification(Verification::Pending);

        let rec = ResultRecord::from_run(&req, &state, started());
        assert!(rec.success);
        assert!(!rec.verified);
        assert_eq!(rec.invoice.as_deref(), Some("rgb:inv-1"));
        assert_eq!(rec.transaction_id, Some(TransactionId::Pending));
        assert_eq!(rec.signing_coordinate, Some(DerivationCoordinate::new(9, 1)));
    }

    #[test]
    fn json_sink_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let rec = ResultRecord::from_run(&req, &TransferState::new(), started());

        let sink = JsonFileSink::new(dir.path().join("results"));
        let path = sink.persist(&rec).unwrap();
        assert_eq!(path.file_name().unwrap(), "rgb_transfer_result_20250314_150926.json");

        let back: ResultRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, rec);

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["transfer_amount"], 500);
        assert_eq!(raw["final_stage"], "START");
        assert!(raw["files_created"]["psbt"].as_str().unwrap().ends_with("rgb_transfer_t.psbt"));
    }
}
