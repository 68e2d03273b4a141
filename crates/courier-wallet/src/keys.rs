//! Master key handling and single-use candidate key derivation.
//!
//! Candidate keys live at `m/86'/coin'/0'/branch/index` below the sender's
//! master extended private key, where `coin` is 0 on mainnet and 1 on every
//! test network. Each derived scalar is exported as a compressed-key WIF so
//! the node wallet can import it.

use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, ExtendedPrivKey};
use bitcoin::secp256k1::{All, Secp256k1};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use courier_core::DerivationCoordinate;

use crate::error::DerivationError;

/// BIP-86 purpose level (single-key taproot outputs).
pub const PURPOSE: u32 = 86;

/// Account level below the coin type.
pub const ACCOUNT: u32 = 0;

/// WIF version byte for mainnet keys.
pub const WIF_PREFIX_MAINNET: u8 = 0x80;

/// WIF version byte shared by testnet, signet, and regtest keys.
pub const WIF_PREFIX_TESTNET: u8 = 0xEF;

/// Suffix marking the key as belonging to a compressed public key.
pub const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// The sender's master extended private key.
///
/// Parsed once; each [`derive`](Self::derive) call is pure.
#[derive(Clone)]
pub struct MasterKey {
    xpriv: ExtendedPrivKey,
    secp: Secp256k1<All>,
}

impl MasterKey {
    /// Parse a base58 extended private key (`xprv...` / `tprv...`).
    pub fn parse(encoded: &str) -> Result<Self, DerivationError> {
        let xpriv = ExtendedPrivKey::from_str(encoded.trim())
            .map_err(|e| DerivationError::InvalidMasterKey(e.to_string()))?;
        Ok(Self {
            xpriv,
            secp: Secp256k1::new(),
        })
    }

    /// Whether the key was encoded for a test network.
    pub fn is_testnet(&self) -> bool {
        !matches!(self.xpriv.network, bitcoin::Network::Bitcoin)
    }

    fn coin_type(&self) -> u32 {
        if self.is_testnet() { 1 } else { 0 }
    }

    /// Full child path for a coordinate.
    pub fn path(&self, coord: DerivationCoordinate) -> Result<[ChildNumber; 5], DerivationError> {
        let hardened = |i| ChildNumber::from_hardened_idx(i).map_err(|_| DerivationError::InvalidCoordinate(coord));
        let normal = |i| ChildNumber::from_normal_idx(i).map_err(|_| DerivationError::InvalidCoordinate(coord));
        Ok([
            hardened(PURPOSE)?,
            hardened(self.coin_type())?,
            hardened(ACCOUNT)?,
            normal(coord.branch)?,
            normal(coord.index)?,
        ])
    }

    /// Human-readable path, e.g. `m/86'/1'/0'/10/1`.
    pub fn path_string(&self, coord: DerivationCoordinate) -> String {
        format!(
            "m/{PURPOSE}'/{}'/{ACCOUNT}'/{}/{}",
            self.coin_type(),
            coord.branch,
            coord.index
        )
    }

    /// Derive the candidate key at `coord`.
    ///
    /// Fails only for coordinates that do not fit a non-hardened level.
    pub fn derive(&self, coord: DerivationCoordinate) -> Result<CandidateKey, DerivationError> {
        let path = self.path(coord)?;
        let child = self
            .xpriv
            .derive_priv(&self.secp, &path)
            .map_err(|_| DerivationError::InvalidCoordinate(coord))?;
        let secret = child.private_key.secret_bytes();
        let wif = encode_wif(&secret, self.is_testnet());
        Ok(CandidateKey {
            coordinate: coord,
            secret,
            wif,
        })
    }
}

impl FromStr for MasterKey {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("network", &self.xpriv.network)
            .field("xpriv", &"[REDACTED]")
            .finish()
    }
}

/// Parse `encoded` and derive the key at `coord` in one step.
pub fn derive(encoded: &str, coord: DerivationCoordinate) -> Result<CandidateKey, DerivationError> {
    MasterKey::parse(encoded)?.derive(coord)
}

/// A derived private key scoped to one coordinate.
///
/// Secret bytes and the WIF string are wiped when the trial drops it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CandidateKey {
    #[zeroize(skip)]
    coordinate: DerivationCoordinate,
    secret: [u8; 32],
    wif: String,
}

impl CandidateKey {
    pub fn coordinate(&self) -> DerivationCoordinate {
        self.coordinate
    }

    /// Raw 32-byte private scalar. Handle with care.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Wallet import format of the key.
    pub fn wif(&self) -> &str {
        &self.wif
    }
}

impl fmt::Debug for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateKey")
            .field("coordinate", &self.coordinate)
            .field("wif", &"[REDACTED]")
            .finish()
    }
}

/// First four bytes of SHA-256(SHA-256(payload)).
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    [second[0], second[1], second[2], second[3]]
}

/// Encode a private scalar as a compressed-key WIF.
///
/// Layout: `version || secret || 0x01 || checksum`, base58.
pub fn encode_wif(secret: &[u8; 32], testnet: bool) -> String {
    let mut payload = Vec::with_capacity(1 + 32 + 1 + 4);
    payload.push(if testnet {
        WIF_PREFIX_TESTNET
    } else {
        WIF_PREFIX_MAINNET
    });
    payload.extend_from_slice(secret);
    payload.push(WIF_COMPRESSED_FLAG);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    let wif = bs58::encode(&payload).into_string();
    payload.zeroize();
    wif
}
