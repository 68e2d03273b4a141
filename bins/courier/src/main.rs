//! courier: RGB token transfer orchestrator.
//!
//! Drives a transfer between two local RGB wallets end to end: invoice,
//! transfer package, validation and acceptance, trial signing with keys
//! derived from the sender's master key, broadcast, and a final check of
//! the receiver's state.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use courier_core::{BitcoinCli, CommandGateway, DerivationCoordinate, Network, RgbCli};
use courier_transfer::{JsonFileSink, Orchestrator, Reconciler, Verification};
use courier_wallet::SigningSearch;

use crate::config::Settings;

/// RGB transfer orchestrator.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Move RGB tokens between two local wallets")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full transfer from invoice to verification.
    Transfer,
    /// Sign and broadcast an existing transaction artifact.
    Sign {
        /// PSBT file produced by a transfer step.
        psbt: PathBuf,
    },
    /// Check whether the receiver's state shows the configured amount.
    Verify,
    /// Print the path and WIF of one candidate key.
    Derive {
        #[arg(long)]
        branch: u32,
        #[arg(long)]
        index: u32,
    },
}

/// Command-line values that take precedence over file and environment.
#[derive(Args, Debug)]
struct Overrides {
    /// Configuration file (default: ~/.rgb-courier/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Network: bitcoin, testnet, signet or regtest.
    #[arg(long, global = true)]
    network: Option<Network>,

    /// Sender's RGB wallet directory.
    #[arg(long, global = true)]
    sender_dir: Option<PathBuf>,

    /// Receiver's RGB wallet directory.
    #[arg(long, global = true)]
    receiver_dir: Option<PathBuf>,

    /// Contract identifier.
    #[arg(long, global = true)]
    contract_id: Option<String>,

    /// Amount of tokens to transfer.
    #[arg(long, global = true)]
    amount: Option<u64>,

    /// Node wallet used for signing.
    #[arg(long, global = true)]
    signing_wallet: Option<String>,

    /// Esplora endpoint for the RGB engine.
    #[arg(long, global = true)]
    esplora_url: Option<String>,

    /// Per-command timeout in seconds (clamped to 30..=60).
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Directory for result records.
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.network {
            settings.network = v;
        }
        if let Some(v) = self.sender_dir {
            settings.sender_dir = v;
        }
        if let Some(v) = self.receiver_dir {
            settings.receiver_dir = v;
        }
        if let Some(v) = self.contract_id {
            settings.contract_id = v;
        }
        if let Some(v) = self.amount {
            settings.amount = v;
        }
        if let Some(v) = self.signing_wallet {
            settings.signing_wallet = v;
        }
        if let Some(v) = self.esplora_url {
            settings.esplora_url = v;
        }
        if let Some(v) = self.timeout {
            settings.timeout_secs = v;
        }
        if let Some(v) = self.results_dir {
            settings.results_dir = v;
        }
    }
}

/// Concrete collaborators built from settings.
struct Runners {
    rgb: Arc<RgbCli>,
    node: Arc<BitcoinCli>,
}

impl Runners {
    fn new(settings: &Settings) -> Self {
        let gateway: Arc<dyn CommandGateway> = Arc::new(settings.gateway());
        let rgb = Arc::new(RgbCli::new(gateway.clone(), settings.network, settings.esplora_url.clone()));
        let node = Arc::new(BitcoinCli::new(
            gateway,
            settings.network,
            settings.compose_project.clone(),
            settings.compose_service.clone(),
        ));
        Self { rgb, node }
    }

    fn reconciler(&self, settings: &Settings) -> Reconciler {
        Reconciler::new(self.rgb.clone()).with_settle_delay(settings.settle_delay())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::load(cli.overrides.config.as_deref())?;
    cli.overrides.apply(&mut settings);

    match cli.command {
        Commands::Transfer => transfer(&settings).await,
        Commands::Sign { psbt } => sign(&settings, psbt).await,
        Commands::Verify => verify(&settings).await,
        Commands::Derive { branch, index } => derive(&settings, DerivationCoordinate::new(branch, index)),
    }
}

async fn transfer(settings: &Settings) -> Result<ExitCode> {
    settings.validate_transfer()?;
    let master = settings.master_key()?;

    info!("network: {}", settings.network);
    info!("sender: {}", settings.sender_dir.display());
    info!("receiver: {}", settings.receiver_dir.display());
    info!("signing wallet: {}", settings.signing_wallet);

    let runners = Runners::new(settings);
    let signer = SigningSearch::new(runners.node.clone(), master, settings.search_plan());
    let orchestrator = Orchestrator::new(
        runners.rgb.clone(),
        signer,
        runners.reconciler(settings),
        Arc::new(JsonFileSink::new(&settings.results_dir)),
    );

    let started = Utc::now();
    let request = settings.transfer_request(started);
    let report = orchestrator.run_at(&request, started).await;

    println!("final stage: {}", report.state.stage());
    for outcome in report.state.history() {
        let mark = if outcome.ok { "ok" } else { "FAILED" };
        println!("  {:<10} {:<6} {}", outcome.stage.as_str(), mark, outcome.detail);
    }
    if let Some(txid) = report.state.transaction_id() {
        println!("transaction: {txid}");
    }
    if let Some(path) = &report.record_path {
        println!("result record: {}", path.display());
    }

    if report.record_path.is_none() {
        error!("result record was not persisted");
        return Ok(ExitCode::FAILURE);
    }
    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn sign(settings: &Settings, psbt: PathBuf) -> Result<ExitCode> {
    settings.validate_plan()?;
    let master = settings.master_key()?;
    let runners = Runners::new(settings);
    let signer = SigningSearch::new(runners.node.clone(), master, settings.search_plan());

    match signer.sign_file(&psbt, &settings.signing_wallet).await {
        Ok(signed) => {
            println!("transaction: {}", signed.txid);
            println!("coordinate:  {}", signed.coordinate);
            if let Some(warning) = &signed.warning {
                warn!("{warning}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("signing failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn verify(settings: &Settings) -> Result<ExitCode> {
    settings.validate_contract()?;
    let runners = Runners::new(settings);
    let verdict = runners
        .reconciler(settings)
        .check(
            settings.contract_id.trim(),
            &settings.interface,
            settings.amount,
            &settings.receiver_dir,
        )
        .await;

    match &verdict {
        Verification::Confirmed => println!("confirmed: {} visible in receiver state", settings.amount),
        Verification::Pending => println!("pending: {} not yet visible", settings.amount),
        Verification::Inconclusive { reason } => println!("inconclusive: {reason}"),
    }
    Ok(if verdict.is_confirmed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn derive(settings: &Settings, coord: DerivationCoordinate) -> Result<ExitCode> {
    let master = settings.master_key()?;
    let key = master
        .derive(coord)
        .with_context(|| format!("cannot derive coordinate {coord}"))?;
    println!("path: {}", master.path_string(coord));
    println!("label: {}", coord.import_label());
    println!("wif: {}", key.wif());
    Ok(ExitCode::SUCCESS)
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `--log-level`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_derive() {
        let cli = Cli::try_parse_from(["courier", "derive", "--branch", "9", "--index", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Derive { branch: 9, index: 2 }));
    }

    #[test]
    fn global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "courier",
            "transfer",
            "--amount",
            "500",
            "--network",
            "testnet",
            "--contract-id",
            "rgb:abc",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.overrides.apply(&mut settings);
        assert_eq!(settings.amount, 500);
        assert_eq!(settings.network, Network::Testnet);
        assert_eq!(settings.contract_id, "rgb:abc");
        assert_eq!(settings.interface, "RGB20Fixed");
    }

    #[test]
    fn sign_takes_artifact_path() {
        let cli = Cli::try_parse_from(["courier", "sign", "out.psbt"]).unwrap();
        match cli.command {
            Commands::Sign { psbt } => assert_eq!(psbt, PathBuf::from("out.psbt")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(Cli::try_parse_from(["courier", "verify", "--network", "moonnet"]).is_err());
    }
}
