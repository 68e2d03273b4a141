//! Trial signing over an ordered list of derivation coordinates.
//!
//! The node wallet is asked to sign the artifact with one candidate key at a
//! time. A coordinate counts as found only when its signature finalizes
//! into a complete transaction and the submission is not rejected for a
//! key-related reason. The search stops at the first such coordinate.
//!
//! Every trial imports a key into the node wallet. Imports are cumulative
//! and safe to repeat, so an interrupted run can simply be restarted.

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{debug, info, warn};

use courier_core::{ChainNode, DerivationCoordinate, GatewayError};

use crate::error::SigningError;
use crate::keys::MasterKey;
use crate::submission::{classify, Submission, TransactionId};

/// Ordered candidate coordinates for a search.
///
/// Priority coordinates come first in the order given. The fallback grid
/// follows, ordered by branch then index, minus anything already listed as
/// priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    priority: Vec<DerivationCoordinate>,
    fallback: Vec<DerivationCoordinate>,
}

impl Default for SearchPlan {
    fn default() -> Self {
        Self::grid(vec![DerivationCoordinate::new(10, 1)], &[9, 10, 11], 0..=6)
    }
}

impl SearchPlan {
    /// Priority coordinates plus the rectangle `branches x indexes`.
    pub fn grid(
        priority: Vec<DerivationCoordinate>,
        branches: &[u32],
        indexes: RangeInclusive<u32>,
    ) -> Self {
        let fallback = branches
            .iter()
            .flat_map(|&b| indexes.clone().map(move |i| DerivationCoordinate::new(b, i)))
            .collect();
        Self { priority, fallback }
    }

    /// A plan that tries exactly `order`, nothing else.
    pub fn exact(order: Vec<DerivationCoordinate>) -> Self {
        Self {
            priority: order,
            fallback: Vec::new(),
        }
    }

    /// Candidates in search order: by priority rank, then branch, then index.
    pub fn candidates(&self) -> Vec<DerivationCoordinate> {
        let mut out: Vec<DerivationCoordinate> = Vec::with_capacity(self.priority.len() + self.fallback.len());
        for c in &self.priority {
            if !out.contains(c) {
                out.push(*c);
            }
        }
        let mut rest: Vec<DerivationCoordinate> = self
            .fallback
            .iter()
            .filter(|c| !self.priority.contains(c))
            .copied()
            .collect();
        rest.sort();
        rest.dedup();
        out.extend(rest);
        out
    }
}

/// A signed transaction and the coordinate whose key produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txid: TransactionId,
    /// Fully signed raw transaction.
    pub hex: String,
    pub coordinate: DerivationCoordinate,
    /// Set when the broadcast did not produce a fresh id.
    pub warning: Option<String>,
}

#[derive(Deserialize)]
struct ProcessedPsbt {
    psbt: String,
}

#[derive(Deserialize)]
struct FinalizedPsbt {
    #[serde(default)]
    hex: Option<String>,
    #[serde(default)]
    complete: bool,
}

/// Finds the key that authorizes a transaction artifact and submits it.
pub struct SigningSearch {
    node: Arc<dyn ChainNode>,
    master: MasterKey,
    plan: SearchPlan,
}

impl SigningSearch {
    pub fn new(node: Arc<dyn ChainNode>, master: MasterKey, plan: SearchPlan) -> Self {
        Self { node, master, plan }
    }

    pub fn plan(&self) -> &SearchPlan {
        &self.plan
    }

    /// Make sure the legacy signing wallet exists and is loaded.
    ///
    /// Both calls fail harmlessly when the wallet already exists or is
    /// already loaded; any other failure is logged as a warning and the
    /// search goes ahead.
    pub async fn prepare_wallet(&self, wallet: &str) {
        let name = format!("wallet_name={wallet}");
        let created = self
            .node
            .call(
                None,
                &["-named", "createwallet", name.as_str(), "descriptors=false", "load_on_startup=true"],
            )
            .await;
        match created {
            Ok(_) => info!(wallet, "created signing wallet"),
            Err(e) if wallet_already_present(&e) => debug!(wallet, "createwallet: {e}"),
            Err(e) => warn!(wallet, "createwallet failed: {e}"),
        }
        match self.node.call(None, &["loadwallet", wallet]).await {
            Ok(_) => info!(wallet, "loaded signing wallet"),
            Err(e) if wallet_already_present(&e) => debug!(wallet, "loadwallet: {e}"),
            Err(e) => warn!(wallet, "loadwallet failed: {e}"),
        }
    }

    /// Read the artifact at `path` and run [`sign_and_submit`](Self::sign_and_submit).
    pub async fn sign_file(&self, path: &Path, wallet: &str) -> Result<SignedTransaction, SigningError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SigningError::ArtifactUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), size = bytes.len(), "read transaction artifact");
        self.sign_and_submit(&bytes, wallet).await
    }

    /// Try each candidate in order until one signs, finalizes, and is not
    /// rejected on submission.
    pub async fn sign_and_submit(&self, artifact: &[u8], wallet: &str) -> Result<SignedTransaction, SigningError> {
        self.prepare_wallet(wallet).await;

        let psbt = BASE64.encode(artifact);
        let candidates = self.plan.candidates();
        info!(candidates = candidates.len(), "starting signing search");

        for (n, coord) in candidates.iter().enumerate() {
            info!(coordinate = %coord, "trying candidate {}/{}", n + 1, candidates.len());
            match self.try_coordinate(&psbt, wallet, *coord).await {
                Ok(signed) => {
                    info!(coordinate = %coord, txid = %signed.txid, "signing key found");
                    return Ok(signed);
                }
                Err(miss) => debug!(coordinate = %coord, "miss: {miss}"),
            }
        }

        warn!(tried = candidates.len(), "signing search exhausted");
        Err(SigningError::SigningExhausted {
            tried: candidates.len(),
        })
    }

    /// One trial. `Err` is a search miss, not a failure of the search.
    async fn try_coordinate(
        &self,
        psbt: &str,
        wallet: &str,
        coord: DerivationCoordinate,
    ) -> Result<SignedTransaction, String> {
        let key = self.master.derive(coord).map_err(|e| e.to_string())?;
        let label = coord.import_label();

        match self
            .node
            .call(Some(wallet), &["importprivkey", key.wif(), label.as_str(), "false"])
            .await
        {
            Ok(_) => debug!(label = %label, "imported candidate key"),
            Err(e) if e.message().contains("already exists") => debug!(label = %label, "key already imported"),
            Err(e) => warn!(label = %label, "key import failed: {e}"),
        }
        drop(key);

        let processed = self
            .node
            .call(Some(wallet), &["walletprocesspsbt", psbt, "true"])
            .await
            .map_err(|e| format!("walletprocesspsbt: {e}"))?;
        let processed: ProcessedPsbt =
            serde_json::from_str(&processed).map_err(|e| format!("walletprocesspsbt output: {e}"))?;

        let arg = format!("psbt={}", processed.psbt);
        let finalized = self
            .node
            .call(None, &["-named", "finalizepsbt", arg.as_str(), "extract=true"])
            .await
            .map_err(|e| format!("finalizepsbt: {e}"))?;
        let finalized: FinalizedPsbt =
            serde_json::from_str(&finalized).map_err(|e| format!("finalizepsbt output: {e}"))?;
        let hex = match finalized {
            FinalizedPsbt {
                complete: true,
                hex: Some(hex),
            } if !hex.is_empty() => hex,
            _ => return Err("finalization incomplete".into()),
        };

        let submitted = self.node.call(None, &["sendrawtransaction", hex.as_str()]).await;
        match classify(submitted) {
            Submission::Accepted { txid } => Ok(SignedTransaction {
                txid: TransactionId::Broadcast(txid),
                hex,
                coordinate: coord,
                warning: None,
            }),
            Submission::Benign { txid, warning } => {
                warn!(coordinate = %coord, "{warning}");
                Ok(SignedTransaction {
                    txid,
                    hex,
                    coordinate: coord,
                    warning: Some(warning),
                })
            }
            Submission::Rejected { reason } => Err(format!("broadcast rejected: {reason}")),
        }
    }
}

/// Node errors meaning the signing wallet is already in place.
fn wallet_already_present(e: &GatewayError) -> bool {
    let text = e.message().to_ascii_lowercase();
    text.contains("already exists") || text.contains("already loaded")
}
