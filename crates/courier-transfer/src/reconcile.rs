//! Post-broadcast check of the receiver's contract state.
//!
//! The receiver's RGB wallet is synced against the ledger and its state
//! listing is searched for the transferred amount. This is a heuristic: an
//! unrelated allocation with the same amount is a false positive, a
//! differently formatted amount a false negative. It never errors, because
//! a lagging or failed query must not undo a transfer that already went
//! through.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use courier_core::ProtocolRunner;

/// Default wait between broadcast and the state query.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// The amount appears in the receiver's state.
    Confirmed,
    /// The query worked but the amount is not visible yet.
    Pending,
    /// The state could not be queried.
    Inconclusive { reason: String },
}

impl Verification {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Queries receiver-side state after the transaction has been submitted.
#[derive(Clone)]
pub struct Reconciler {
    runner: Arc<dyn ProtocolRunner>,
    settle_delay: Duration,
}

impl Reconciler {
    pub fn new(runner: Arc<dyn ProtocolRunner>) -> Self {
        Self {
            runner,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sync the receiver's wallet once and classify what it shows.
    pub async fn check(
        &self,
        contract_id: &str,
        interface: &str,
        amount: u64,
        receiver_dir: &Path,
    ) -> Verification {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let state = self
            .runner
            .run(receiver_dir, &["state", contract_id, interface, "--sync"])
            .await;

        let amount = amount.to_string();
        match state {
            Ok(listing) if listing.contains(&amount) => {
                info!(amount = %amount, "receiver state shows the transferred amount");
                Verification::Confirmed
            }
            Ok(_) => {
                warn!(amount = %amount, "transferred amount not yet visible in receiver state");
                Verification::Pending
            }
            Err(e) => {
                warn!("could not query receiver state: {e}");
                Verification::Inconclusive {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// `true` only when the amount was found.
    pub async fn verify(
        &self,
        contract_id: &str,
        interface: &str,
        amount: u64,
        receiver_dir: &Path,
    ) -> bool {
        self.check(contract_id, interface, amount, receiver_dir)
            .await
            .is_confirmed()
    }
}
