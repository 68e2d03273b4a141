//! Shared stubs for E2E tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::bip32::ExtendedPrivKey;

use courier_core::{
    ArtifactPaths, ChainNode, DerivationCoordinate, GatewayError, Network, Outcome, ProtocolRunner,
    TransferRequest,
};
use courier_transfer::{JsonFileSink, Orchestrator, Reconciler};
use courier_wallet::{MasterKey, SearchPlan, SigningSearch};

/// Signed transaction hex the stub node hands out.
pub const SIGNED_HEX: &str = "02000000000101deadbeef";

/// Encoded regtest master key derived from a fixed seed byte.
pub fn master_key_string(seed: u8) -> String {
    ExtendedPrivKey::new_master(bitcoin::Network::Regtest, &[seed; 32])
        .unwrap()
        .to_string()
}

pub fn master_key(seed: u8) -> MasterKey {
    MasterKey::parse(&master_key_string(seed)).unwrap()
}

pub fn rejected(stderr: &str) -> Outcome {
    Err(GatewayError::NonZeroExit {
        code: Some(1),
        stderr: stderr.into(),
    })
}

/// A transfer request whose wallets and artifacts live under `dir`.
pub fn request(dir: &Path, amount: u64) -> TransferRequest {
    TransferRequest {
        sender_dir: dir.join(".alice"),
        receiver_dir: dir.join(".bob"),
        signing_wallet: "alice_legacy".into(),
        contract_id: "rgb:2bLwMW-test".into(),
        interface: "RGB20Fixed".into(),
        amount,
        network: Network::Regtest,
        artifacts: ArtifactPaths::timestamped(dir, "20250314_150926"),
    }
}

// ---------------------------------------------------------------------------
// RGB engine
// ---------------------------------------------------------------------------

/// In-process RGB engine.
///
/// Answers each operation from its configuration and writes the transfer
/// artifacts to the paths it is given.
pub struct StubEngine {
    pub invoice: String,
    /// Receiver state listing returned by `state`.
    pub state: Outcome,
    /// Operation that fails, with its error text.
    pub fail_on: Option<(&'static str, String)>,
    pub write_consignment: bool,
    pub write_psbt: bool,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl StubEngine {
    pub fn new(invoice: &str, state: &str) -> Self {
        Self {
            invoice: invoice.into(),
            state: Ok(state.into()),
            fail_on: None,
            write_consignment: true,
            write_psbt: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, operation: &'static str, stderr: &str) -> Self {
        self.fail_on = Some((operation, stderr.into()));
        self
    }

    pub fn without_psbt(mut self) -> Self {
        self.write_psbt = false;
        self
    }

    /// Operation names in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
    }

    /// Wallet directory each operation ran against.
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProtocolRunner for StubEngine {
    async fn run(&self, wallet_dir: &Path, args: &[&str]) -> Outcome {
        let op = args[0];
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), wallet_dir.to_path_buf()));

        if let Some((failing, stderr)) = &self.fail_on {
            if *failing == op {
                return rejected(stderr);
            }
        }

        match op {
            "invoice" => Ok(self.invoice.clone()),
            "transfer" => {
                if self.write_consignment {
                    std::fs::write(args[2], b"consignment").unwrap();
                }
                if self.write_psbt {
                    std::fs::write(args[3], b"psbt-bytes").unwrap();
                }
                Ok(String::new())
            }
            "validate" => Ok("Consignment is valid".into()),
            "accept" => Ok("Transfer accepted".into()),
            "state" => self.state.clone(),
            other => rejected(&format!("unexpected operation {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Bitcoin node
// ---------------------------------------------------------------------------

/// In-process node wallet.
///
/// `walletprocesspsbt` marks the PSBT signed only once the key at the
/// authorized coordinate has been imported. Finalization succeeds only for
/// signed PSBTs.
pub struct StubNode {
    authorized_wif: String,
    send: Outcome,
    imported: Mutex<HashSet<String>>,
    labels: Mutex<Vec<String>>,
    wallet_calls: Mutex<Vec<String>>,
}

impl StubNode {
    /// A node that accepts the key at `authorized` under master `seed`.
    pub fn new(seed: u8, authorized: DerivationCoordinate, send: Outcome) -> Self {
        let authorized_wif = master_key(seed).derive(authorized).unwrap().wif().to_string();
        Self {
            authorized_wif,
            send,
            imported: Mutex::new(HashSet::new()),
            labels: Mutex::new(Vec::new()),
            wallet_calls: Mutex::new(Vec::new()),
        }
    }

    /// Import labels in the order keys were tried.
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    /// Wallet management calls (`createwallet`, `loadwallet`).
    pub fn wallet_calls(&self) -> Vec<String> {
        self.wallet_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainNode for StubNode {
    async fn call(&self, _wallet: Option<&str>, args: &[&str]) -> Outcome {
        let method = if args[0] == "-named" { args[1] } else { args[0] };
        match method {
            "createwallet" | "loadwallet" => {
                self.wallet_calls.lock().unwrap().push(method.to_string());
                rejected("Database already exists.")
            }
            "importprivkey" => {
                self.labels.lock().unwrap().push(args[2].to_string());
                self.imported.lock().unwrap().insert(args[1].to_string());
                Ok(String::new())
            }
            "walletprocesspsbt" => {
                let signed = self.imported.lock().unwrap().contains(&self.authorized_wif);
                let psbt = if signed {
                    format!("signed-{}", args[1])
                } else {
                    args[1].to_string()
                };
                Ok(serde_json::json!({ "psbt": psbt, "complete": signed }).to_string())
            }
            "finalizepsbt" => {
                if args[2].starts_with("psbt=signed-") {
                    Ok(serde_json::json!({ "hex": SIGNED_HEX, "complete": true }).to_string())
                } else {
                    Ok(serde_json::json!({ "psbt": args[2], "complete": false }).to_string())
                }
            }
            "sendrawtransaction" => self.send.clone(),
            other => rejected(&format!("Method not found: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// An orchestrator over the stubs, writing records into `results_dir`.
pub fn orchestrator(
    engine: Arc<StubEngine>,
    node: Arc<StubNode>,
    seed: u8,
    plan: SearchPlan,
    results_dir: &Path,
) -> Orchestrator {
    let signer = SigningSearch::new(node, master_key(seed), plan);
    let reconciler = Reconciler::new(engine.clone()).with_settle_delay(Duration::ZERO);
    Orchestrator::new(engine, signer, reconciler, Arc::new(JsonFileSink::new(results_dir)))
}
