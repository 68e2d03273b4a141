//! Orchestration stages and the state record the orchestrator mutates.

use std::fmt;

use serde::{Deserialize, Serialize};

use courier_wallet::{SignedTransaction, TransactionId};

use crate::error::TransferError;
use crate::reconcile::Verification;

/// A position in the transfer state machine.
///
/// Transitions are strictly forward: each stage is entered only from its
/// predecessor, and any non-terminal stage may drop to [`Stage::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Start,
    Invoiced,
    Packaged,
    Validated,
    Accepted,
    Signed,
    Reconciled,
    Done,
    Failed,
}

impl Stage {
    /// The only stage reachable on success, or `None` for terminal stages.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Self::Invoiced),
            Self::Invoiced => Some(Self::Packaged),
            Self::Packaged => Some(Self::Validated),
            Self::Validated => Some(Self::Accepted),
            Self::Accepted => Some(Self::Signed),
            Self::Signed => Some(Self::Reconciled),
            Self::Reconciled => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Invoiced => "INVOICED",
            Self::Packaged => "PACKAGED",
            Self::Validated => "VALIDATED",
            Self::Accepted => "ACCEPTED",
            Self::Signed => "SIGNED",
            Self::Reconciled => "RECONCILED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened when the machine tried to enter a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub ok: bool,
    pub detail: String,
}

/// Mutable record of one orchestration run.
#[derive(Debug, Clone, Default)]
pub struct TransferState {
    stage: Stage,
    history: Vec<StageOutcome>,
    invoice: Option<String>,
    signed: Option<SignedTransaction>,
    verification: Option<Verification>,
    error: Option<TransferError>,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `to`, which must be the current stage's successor.
    pub fn advance(&mut self, to: Stage, detail: impl Into<String>) -> Result<(), TransferError> {
        let from = self.stage();
        if from.successor() != Some(to) {
            return Err(TransferError::IllegalTransition { from, to });
        }
        self.stage = to;
        self.history.push(StageOutcome {
            stage: to,
            ok: true,
            detail: detail.into(),
        });
        Ok(())
    }

    /// Drop to FAILED, recording the error against the stage that was being
    /// entered. No-op once terminal.
    pub fn fail(&mut self, error: TransferError) {
        let current = self.stage();
        if current.is_terminal() {
            return;
        }
        let attempted = current.successor().unwrap_or(current);
        self.history.push(StageOutcome {
            stage: attempted,
            ok: false,
            detail: error.to_string(),
        });
        self.stage = Stage::Failed;
        self.error = Some(error);
    }

    pub fn history(&self) -> &[StageOutcome] {
        &self.history
    }

    pub fn invoice(&self) -> Option<&str> {
        self.invoice.as_deref()
    }

    pub fn signed(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }

    /// Final transaction id: a real id, a sentinel, or `None` before signing.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.signed.as_ref().map(|s| &s.txid)
    }

    pub fn verification(&self) -> Option<&Verification> {
        self.verification.as_ref()
    }

    pub fn error(&self) -> Option<&TransferError> {
        self.error.as_ref()
    }

    pub(crate) fn set_invoice(&mut self, invoice: String) {
        self.invoice = Some(invoice);
    }

    pub(crate) fn set_signed(&mut self, signed: SignedTransaction) {
        self.signed = Some(signed);
    }

    pub(crate) fn set_verification(&mut self, verification: Verification) {
        self.verification = Some(verification);
    }
}
