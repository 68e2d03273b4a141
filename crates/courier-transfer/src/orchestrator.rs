//! The transfer state machine driver.
//!
//! One run is strictly sequential: every external call is awaited before
//! the next is issued. Two runs must not share a signing wallet, since the
//! node does not serialize `walletprocesspsbt` calls against one wallet.
//! That is the caller's responsibility.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use courier_core::{ProtocolRunner, TransferRequest};
use courier_wallet::SigningSearch;

use crate::artifacts::remove_artifacts;
use crate::error::TransferError;
use crate::reconcile::{Reconciler, Verification};
use crate::record::{RecordSink, ResultRecord};
use crate::stage::{Stage, TransferState};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct TransferReport {
    pub state: TransferState,
    pub record: ResultRecord,
    /// Where the record was stored, if persisting worked.
    pub record_path: Option<PathBuf>,
}

impl TransferReport {
    /// The run reached DONE, verified or not.
    pub fn succeeded(&self) -> bool {
        self.state.stage() == Stage::Done
    }

    pub fn error(&self) -> Option<&TransferError> {
        self.state.error()
    }
}

/// Drives one transfer from invoice to reconciliation.
pub struct Orchestrator {
    protocol: Arc<dyn ProtocolRunner>,
    signer: SigningSearch,
    reconciler: Reconciler,
    sink: Arc<dyn RecordSink>,
}

impl Orchestrator {
    pub fn new(
        protocol: Arc<dyn ProtocolRunner>,
        signer: SigningSearch,
        reconciler: Reconciler,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            protocol,
            signer,
            reconciler,
            sink,
        }
    }

    /// Run the whole transfer, stamped with the current time.
    pub async fn run(&self, request: &TransferRequest) -> TransferReport {
        self.run_at(request, Utc::now()).await
    }

    /// Run the whole transfer. `started` stamps the result record and
    /// should be the instant the request's artifact paths were built from.
    ///
    /// Always terminates in DONE or FAILED, always removes the artifacts,
    /// and always emits a result record.
    pub async fn run_at(&self, request: &TransferRequest, started: DateTime<Utc>) -> TransferReport {
        info!(
            network = %request.network,
            amount = request.amount,
            contract = %request.contract_id,
            "starting RGB transfer"
        );

        let mut state = TransferState::new();
        let finished = match self.drive(request, &mut state).await {
            Ok(()) => state.advance(Stage::Done, "transfer complete"),
            Err(e) => Err(e),
        };
        if let Err(e) = finished {
            error!(stage = %state.stage(), "transfer failed: {e}");
            state.fail(e);
        }

        remove_artifacts(&request.artifacts);

        let record = ResultRecord::from_run(request, &state, started);
        let record_path = match self.sink.persist(&record) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("could not persist result record: {e}");
                None
            }
        };

        match (state.stage(), state.verification()) {
            (Stage::Done, Some(Verification::Confirmed)) => {
                info!(amount = request.amount, "RGB transfer completed and verified")
            }
            (Stage::Done, _) => warn!("transfer may have completed but verification failed; check wallet states manually"),
            _ => {}
        }

        TransferReport {
            state,
            record,
            record_path,
        }
    }

    async fn drive(&self, req: &TransferRequest, state: &mut TransferState) -> Result<(), TransferError> {
        let amount = req.amount_text();
        let consignment = req.artifacts.consignment.to_string_lossy().into_owned();
        let psbt = req.artifacts.psbt.to_string_lossy().into_owned();

        info!("step 1: receiver generates invoice");
        let invoice = self
            .protocol_step(
                Stage::Invoiced,
                &req.receiver_dir,
                &["invoice", req.contract_id.as_str(), "--amount", amount.as_str()],
            )
            .await?;
        info!(invoice = %preview(&invoice), "invoice generated");
        state.set_invoice(invoice.clone());
        state.advance(Stage::Invoiced, "invoice generated")?;

        info!("step 2: sender creates transfer package");
        self.protocol_step(
            Stage::Packaged,
            &req.sender_dir,
            &["transfer", invoice.as_str(), consignment.as_str(), psbt.as_str()],
        )
        .await?;
        if let Some(missing) = req.artifacts.first_missing() {
            return Err(TransferError::ArtifactMissing(missing.to_path_buf()));
        }
        let size = std::fs::metadata(&req.artifacts.psbt).map(|m| m.len()).unwrap_or(0);
        info!(psbt = %psbt, size, "transfer package created");
        state.advance(Stage::Packaged, format!("psbt {size} bytes"))?;

        info!("step 3: receiver validates and accepts");
        self.protocol_step(Stage::Validated, &req.receiver_dir, &["validate", consignment.as_str()])
            .await?;
        state.advance(Stage::Validated, "consignment valid")?;

        self.protocol_step(Stage::Accepted, &req.receiver_dir, &["accept", "-f", consignment.as_str()])
            .await?;
        state.advance(Stage::Accepted, "consignment accepted")?;

        info!("step 4: sign and broadcast transaction");
        let signed = self.signer.sign_file(&req.artifacts.psbt, &req.signing_wallet).await?;
        let detail = format!("txid {} via {}", signed.txid, signed.coordinate);
        info!(txid = %signed.txid, coordinate = %signed.coordinate, "transaction processed");
        state.set_signed(signed);
        state.advance(Stage::Signed, detail)?;

        info!("step 5: verify transfer");
        let verification = self
            .reconciler
            .check(&req.contract_id, &req.interface, req.amount, &req.receiver_dir)
            .await;
        let detail = format!("{verification:?}");
        state.set_verification(verification);
        state.advance(Stage::Reconciled, detail)?;

        Ok(())
    }

    async fn protocol_step(&self, stage: Stage, wallet_dir: &Path, args: &[&str]) -> Result<String, TransferError> {
        self.protocol
            .run(wallet_dir, args)
            .await
            .map_err(|source| TransferError::Gateway { stage, source })
    }
}

/// First 50 characters of a long protocol string.
fn preview(text: &str) -> String {
    match text.char_indices().nth(50) {
        Some((at, _)) => format!("{}...", &text[..at]),
        None => text.to_string(),
    }
}
