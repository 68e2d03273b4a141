//! Value types shared by the signing and orchestration crates.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bitcoin network the RGB wallets and the node operate on.
///
/// # Examples
///
/// ```
/// use courier_core::Network;
/// let net: Network = "regtest".parse().unwrap();
/// assert_eq!(net, Network::Regtest);
/// assert_eq!(net.cli_flag(), Some("-regtest"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[serde(alias = "mainnet")]
    Bitcoin,
    /// Public test network.
    Testnet,
    /// Signet test network.
    Signet,
    /// Local regression-test network.
    #[default]
    Regtest,
}

impl Network {
    /// Name passed to the RGB engine's `-n` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Testnet => "testnet",
            Self::Signet => "signet",
            Self::Regtest => "regtest",
        }
    }

    /// Network flag for `bitcoin-cli`. Mainnet takes none.
    pub fn cli_flag(&self) -> Option<&'static str> {
        match self {
            Self::Bitcoin => None,
            Self::Testnet => Some("-testnet"),
            Self::Signet => Some("-signet"),
            Self::Regtest => Some("-regtest"),
        }
    }

    /// Whether this is one of the test networks sharing testnet key encodings.
    pub fn is_test(&self) -> bool {
        !matches!(self, Self::Bitcoin)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" => Ok(Self::Bitcoin),
            "testnet" => Ok(Self::Testnet),
            "signet" => Ok(Self::Signet),
            "regtest" => Ok(Self::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Position of a single-use signing key below the fixed account path:
/// `m/86'/coin'/0'/branch/index`.
///
/// Ordering is by branch, then index. Search order adds a priority rank in
/// front of that (see the signing crate's `SearchPlan`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DerivationCoordinate {
    /// Keychain branch (the fourth path level).
    pub branch: u32,
    /// Address index within the branch (the fifth path level).
    pub index: u32,
}

impl DerivationCoordinate {
    pub const fn new(branch: u32, index: u32) -> Self {
        Self { branch, index }
    }

    /// Label under which the candidate key is imported into the node wallet.
    ///
    /// Tagged with the coordinate so repeated runs re-import under the same
    /// name.
    pub fn import_label(&self) -> String {
        format!("rgb-transfer-{}-{}", self.branch, self.index)
    }
}

impl fmt::Display for DerivationCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.index)
    }
}

/// The consignment and transaction files produced by the transfer step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Token-state transition handed to the receiver.
    pub consignment: PathBuf,
    /// Partially signed base-layer transaction.
    pub psbt: PathBuf,
}

impl ArtifactPaths {
    pub fn new(consignment: impl Into<PathBuf>, psbt: impl Into<PathBuf>) -> Self {
        Self {
            consignment: consignment.into(),
            psbt: psbt.into(),
        }
    }

    /// Artifact paths inside `dir` named after a run timestamp.
    pub fn timestamped(dir: &Path, stamp: &str) -> Self {
        Self {
            consignment: dir.join(format!("rgb_transfer_{stamp}.consignment")),
            psbt: dir.join(format!("rgb_transfer_{stamp}.psbt")),
        }
    }

    /// Both paths, consignment first.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.consignment.as_path(), self.psbt.as_path()].into_iter()
    }

    /// The first path that does not exist on disk, if any.
    pub fn first_missing(&self) -> Option<&Path> {
        self.iter().find(|p| !p.exists())
    }
}

/// Everything one orchestration run needs to know about the transfer.
///
/// Built once by the caller and only ever borrowed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// RGB wallet directory of the party sending tokens.
    pub sender_dir: PathBuf,
    /// RGB wallet directory of the party receiving tokens.
    pub receiver_dir: PathBuf,
    /// Node wallet used to sign the sender's transaction.
    pub signing_wallet: String,
    /// Contract identifier (`rgb:...`).
    pub contract_id: String,
    /// Contract interface name used for state queries.
    pub interface: String,
    /// Amount of tokens to move.
    pub amount: u64,
    /// Network selector.
    pub network: Network,
    /// Where the transfer step must write its artifacts.
    pub artifacts: ArtifactPaths,
}

impl TransferRequest {
    /// Amount as the decimal text the RGB engine prints and accepts.
    pub fn amount_text(&self) -> String {
        self.amount.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parse_aliases() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Bitcoin);
        assert_eq!("Bitcoin".parse::<Network>().unwrap(), Network::Bitcoin);
        assert_eq!("SIGNET".parse::<Network>().unwrap(), Network::Signet);
        assert!("liquid".parse::<Network>().is_err());
    }

    #[test]
    fn network_cli_flags() {
        assert_eq!(Network::Bitcoin.cli_flag(), None);
        assert_eq!(Network::Testnet.cli_flag(), Some("-testnet"));
        assert_eq!(Network::Regtest.cli_flag(), Some("-regtest"));
        assert!(!Network::Bitcoin.is_test());
        assert!(Network::Signet.is_test());
    }

    #[test]
    fn network_serde_lowercase() {
        let json = serde_json::to_string(&Network::Regtest).unwrap();
        assert_eq!(json, "\"regtest\"");
        let back: Network = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(back, Network::Testnet);
    }

    #[test]
    fn coordinate_order_is_branch_then_index() {
        let mut coords = vec![
            DerivationCoordinate::new(10, 0),
            DerivationCoordinate::new(9, 6),
            DerivationCoordinate::new(9, 1),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                DerivationCoordinate::new(9, 1),
                DerivationCoordinate::new(9, 6),
                DerivationCoordinate::new(10, 0),
            ]
        );
    }

    #[test]
    fn coordinate_label_and_display() {
        let c = DerivationCoordinate::new(10, 1);
        assert_eq!(c.import_label(), "rgb-transfer-10-1");
        assert_eq!(c.to_string(), "10/1");
    }

    #[test]
    fn timestamped_artifacts() {
        let paths = ArtifactPaths::timestamped(Path::new("/work"), "20250101_120000");
        assert_eq!(
            paths.consignment,
            PathBuf::from("/work/rgb_transfer_20250101_120000.consignment")
        );
        assert_eq!(paths.psbt, PathBuf::from("/work/rgb_transfer_20250101_120000.psbt"));
        assert_eq!(paths.iter().count(), 2);
    }

    #[test]
    fn first_missing_reports_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::timestamped(dir.path(), "t");
        std::fs::write(&paths.consignment, b"c").unwrap();
        assert_eq!(paths.first_missing(), Some(paths.psbt.as_path()));
        std::fs::write(&paths.psbt, b"p").unwrap();
        assert_eq!(paths.first_missing(), None);
    }
}
