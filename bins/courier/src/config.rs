//! Layered settings: defaults, TOML file, `COURIER_*` environment, flags.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use zeroize::Zeroizing;

use courier_core::constants::{
    DEFAULT_COMPOSE_PROJECT, DEFAULT_COMPOSE_SERVICE, DEFAULT_ESPLORA_URL, DEFAULT_INTERFACE,
    PLACEHOLDER_CONTRACT_ID,
};
use courier_core::{ArtifactPaths, DerivationCoordinate, Network, ProcessGateway, TransferRequest};
use courier_wallet::{MasterKey, SearchPlan};

/// Environment variable prefix, e.g. `COURIER_AMOUNT=500`.
const ENV_PREFIX: &str = "COURIER";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sender's RGB wallet directory.
    pub sender_dir: PathBuf,
    /// Receiver's RGB wallet directory.
    pub receiver_dir: PathBuf,
    pub contract_id: String,
    pub interface: String,
    pub amount: u64,
    pub network: Network,
    pub esplora_url: String,
    pub compose_project: String,
    pub compose_service: String,
    /// Node wallet the candidate keys are imported into.
    pub signing_wallet: String,
    /// Extended private key (tprv/xprv). Prompted for when absent.
    pub master_key: Option<String>,
    pub priority: Vec<DerivationCoordinate>,
    pub fallback_branches: Vec<u32>,
    pub index_start: u32,
    pub index_end: u32,
    /// Directory the transfer artifacts are written to.
    pub work_dir: PathBuf,
    /// Directory result records are written to.
    pub results_dir: PathBuf,
    pub timeout_secs: u64,
    pub settle_delay_secs: u64,
    /// Treat any stderr output from a zero-exit command as failure.
    pub strict_stderr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sender_dir: PathBuf::new(),
            receiver_dir: PathBuf::new(),
            contract_id: String::new(),
            interface: DEFAULT_INTERFACE.to_string(),
            amount: 0,
            network: Network::Regtest,
            esplora_url: DEFAULT_ESPLORA_URL.to_string(),
            compose_project: DEFAULT_COMPOSE_PROJECT.to_string(),
            compose_service: DEFAULT_COMPOSE_SERVICE.to_string(),
            signing_wallet: "alice_legacy".to_string(),
            master_key: None,
            priority: vec![DerivationCoordinate::new(10, 1)],
            fallback_branches: vec![9, 10, 11],
            index_start: 0,
            index_end: 6,
            work_dir: PathBuf::from("."),
            results_dir: PathBuf::from("."),
            timeout_secs: 60,
            settle_delay_secs: 3,
            strict_stderr: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("sender_dir", &self.sender_dir)
            .field("receiver_dir", &self.receiver_dir)
            .field("contract_id", &self.contract_id)
            .field("interface", &self.interface)
            .field("amount", &self.amount)
            .field("network", &self.network)
            .field("esplora_url", &self.esplora_url)
            .field("signing_wallet", &self.signing_wallet)
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field("priority", &self.priority)
            .field("fallback_branches", &self.fallback_branches)
            .field("indexes", &(self.index_start..=self.index_end))
            .field("timeout_secs", &self.timeout_secs)
            .field("strict_stderr", &self.strict_stderr)
            .finish_non_exhaustive()
    }
}

/// `~/.rgb-courier/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rgb-courier").join("config.toml"))
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("fallback_branches")
}

impl Settings {
    /// Load settings. An explicitly given file must exist; the default one
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(Some((path, true)), environment()),
            None => {
                let default = default_config_path();
                Self::load_from(default.as_deref().map(|p| (p, false)), environment())
            }
        }
    }

    fn load_from(file: Option<(&Path, bool)>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some((path, required)) = file {
            builder = builder.add_source(config::File::from(path).required(required));
        }
        let settings: Self = builder
            .add_source(env)
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(settings)
    }

    /// Everything `transfer` needs besides the master key.
    pub fn validate_transfer(&self) -> Result<()> {
        self.validate_contract()?;
        if self.sender_dir.as_os_str().is_empty() {
            bail!("sender_dir is not configured");
        }
        if self.receiver_dir.as_os_str().is_empty() {
            bail!("receiver_dir is not configured");
        }
        self.validate_plan()
    }

    /// Contract and amount, as needed by `verify`.
    pub fn validate_contract(&self) -> Result<()> {
        let id = self.contract_id.trim();
        if id.is_empty() || id.contains(PLACEHOLDER_CONTRACT_ID) {
            bail!("contract_id is not configured");
        }
        if self.amount == 0 {
            bail!("amount must be greater than zero");
        }
        Ok(())
    }

    pub fn validate_plan(&self) -> Result<()> {
        if self.index_start > self.index_end {
            bail!(
                "index_start {} is greater than index_end {}",
                self.index_start,
                self.index_end
            );
        }
        if self.priority.is_empty() && self.fallback_branches.is_empty() {
            bail!("no derivation coordinates to search");
        }
        Ok(())
    }

    /// Parse the configured master key, prompting without echo when unset.
    pub fn master_key(&self) -> Result<MasterKey> {
        let encoded = match &self.master_key {
            Some(key) if !key.trim().is_empty() => Zeroizing::new(key.trim().to_string()),
            _ => Zeroizing::new(
                rpassword::prompt_password("Master private key (tprv): ")
                    .context("master key is required")?,
            ),
        };
        if encoded.trim().is_empty() {
            bail!("master key is required");
        }
        MasterKey::parse(encoded.trim()).context("could not parse master key")
    }

    pub fn search_plan(&self) -> SearchPlan {
        SearchPlan::grid(
            self.priority.clone(),
            &self.fallback_branches,
            self.index_start..=self.index_end,
        )
    }

    /// Process gateway with the configured timeout, clamped to 30..=60s.
    pub fn gateway(&self) -> ProcessGateway {
        ProcessGateway::new(Duration::from_secs(self.timeout_secs)).with_strict_stderr(self.strict_stderr)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Build the immutable request for one run. Artifact paths carry the
    /// run's start time, the same instant the result record is stamped with.
    pub fn transfer_request(&self, started: DateTime<Utc>) -> TransferRequest {
        let stamp = started.format("%Y%m%d_%H%M%S").to_string();
        TransferRequest {
            sender_dir: self.sender_dir.clone(),
            receiver_dir: self.receiver_dir.clone(),
            signing_wallet: self.signing_wallet.clone(),
            contract_id: self.contract_id.trim().to_string(),
            interface: self.interface.clone(),
            amount: self.amount,
            network: self.network,
            artifacts: ArtifactPaths::timestamped(&self.work_dir, &stamp),
        }
    }
}
