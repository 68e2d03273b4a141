//! Collaborator runners: the RGB protocol engine and the bitcoin node.
//!
//! Both are thin argument builders over a [`CommandGateway`]. The traits
//! are the seams the signing and orchestration crates depend on, so tests
//! can substitute stub engines and wallets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::{COMPOSE_PROGRAM, RGB_PROGRAM};
use crate::gateway::{CommandGateway, Invocation, Outcome};
use crate::types::Network;

/// The RGB command-line protocol engine, scoped per wallet directory.
#[async_trait]
pub trait ProtocolRunner: Send + Sync {
    /// Run one protocol operation against the wallet in `wallet_dir`.
    async fn run(&self, wallet_dir: &Path, args: &[&str]) -> Outcome;
}

/// The bitcoin node's wallet and transaction RPCs.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Run one node call, optionally scoped to a named wallet.
    async fn call(&self, wallet: Option<&str>, args: &[&str]) -> Outcome;
}

/// `rgb -d <dir> -n <network> <args...> --esplora=<url>`
#[derive(Clone)]
pub struct RgbCli {
    gateway: Arc<dyn CommandGateway>,
    network: Network,
    esplora_url: String,
    program: PathBuf,
}

impl RgbCli {
    pub fn new(gateway: Arc<dyn CommandGateway>, network: Network, esplora_url: impl Into<String>) -> Self {
        Self {
            gateway,
            network,
            esplora_url: esplora_url.into(),
            program: PathBuf::from(RGB_PROGRAM),
        }
    }

    /// Use a specific engine binary instead of `rgb` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn invocation(&self, wallet_dir: &Path, args: &[&str]) -> Invocation {
        Invocation::new(self.program.to_string_lossy())
            .arg("-d")
            .arg(wallet_dir.to_string_lossy())
            .arg("-n")
            .arg(self.network.as_str())
            .args(args.iter().copied())
            .arg(format!("--esplora={}", self.esplora_url))
    }
}

#[async_trait]
impl ProtocolRunner for RgbCli {
    async fn run(&self, wallet_dir: &Path, args: &[&str]) -> Outcome {
        tracing::info!(operation = args.first().copied().unwrap_or(""), "rgb");
        self.gateway.execute(&self.invocation(wallet_dir, args)).await
    }
}

/// `docker compose -p <project> exec -T <service> bitcoin-cli [-<net>] [-rpcwallet=<w>] <args...>`
#[derive(Clone)]
pub struct BitcoinCli {
    gateway: Arc<dyn CommandGateway>,
    network: Network,
    project: String,
    service: String,
}

impl BitcoinCli {
    pub fn new(
        gateway: Arc<dyn CommandGateway>,
        network: Network,
        project: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            network,
            project: project.into(),
            service: service.into(),
        }
    }

    pub fn invocation(&self, wallet: Option<&str>, args: &[&str]) -> Invocation {
        let mut inv = Invocation::new(COMPOSE_PROGRAM)
            .args(["compose", "-p"])
            .arg(&self.project)
            .args(["exec", "-T"])
            .arg(&self.service)
            .arg("bitcoin-cli");
        if let Some(flag) = self.network.cli_flag() {
            inv = inv.arg(flag);
        }
        if let Some(wallet) = wallet {
            inv = inv.arg(format!("-rpcwallet={wallet}"));
        }
        inv.args(args.iter().copied())
    }
}

#[async_trait]
impl ChainNode for BitcoinCli {
    async fn call(&self, wallet: Option<&str>, args: &[&str]) -> Outcome {
        // Arguments may carry WIF keys. Log the method only.
        let method = args.iter().find(|a| !a.starts_with('-')).copied().unwrap_or("");
        tracing::info!(method, wallet = wallet.unwrap_or("-"), "bitcoin-cli");
        self.gateway.execute(&self.invocation(wallet, args)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every invocation and answers with a fixed output.
    struct Recorder {
        seen: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl CommandGateway for Recorder {
        async fn execute(&self, invocation: &Invocation) -> Outcome {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok("done".into())
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn rgb_invocation_layout() {
        let rgb = RgbCli::new(recorder(), Network::Regtest, "http://localhost:3002");
        let inv = rgb.invocation(Path::new("/w/.bob"), &["invoice", "rgb:abc", "--amount", "500"]);
        assert_eq!(
            inv.to_string(),
            "rgb -d /w/.bob -n regtest invoice rgb:abc --amount 500 --esplora=http://localhost:3002"
        );
    }

    #[test]
    fn rgb_custom_program() {
        let rgb = RgbCli::new(recorder(), Network::Testnet, "http://e").with_program("/opt/rgb");
        let inv = rgb.invocation(Path::new("/w"), &["state"]);
        assert_eq!(inv.program, "/opt/rgb");
    }

    #[test]
    fn bitcoin_invocation_with_wallet() {
        let btc = BitcoinCli::new(recorder(), Network::Regtest, "bitlight-local-env", "bitcoin-core");
        let inv = btc.invocation(Some("alice_legacy"), &["walletprocesspsbt", "cHNidP8=", "true"]);
        assert_eq!(
            inv.to_string(),
            "docker compose -p bitlight-local-env exec -T bitcoin-core bitcoin-cli -regtest \
             -rpcwallet=alice_legacy walletprocesspsbt cHNidP8= true"
        );
    }

    #[test]
    fn bitcoin_invocation_mainnet_has_no_network_flag() {
        let btc = BitcoinCli::new(recorder(), Network::Bitcoin, "p", "s");
        let inv = btc.invocation(None, &["sendrawtransaction", "00"]);
        assert_eq!(
            inv.args,
            vec!["compose", "-p", "p", "exec", "-T", "s", "bitcoin-cli", "sendrawtransaction", "00"]
        );
    }

    #[tokio::test]
    async fn runners_delegate_to_gateway() {
        let rec = recorder();
        let rgb = RgbCli::new(rec.clone(), Network::Regtest, "http://e");
        let btc = BitcoinCli::new(rec.clone(), Network::Regtest, "p", "s");

        assert_eq!(rgb.run(Path::new("/w"), &["validate", "c"]).await.unwrap(), "done");
        assert_eq!(btc.call(None, &["loadwallet", "w"]).await.unwrap(), "done");

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].program, "rgb");
        assert_eq!(seen[1].program, "docker");
    }
}
