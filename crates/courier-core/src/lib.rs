//! # courier-core: Shared types and the external command boundary.
//!
//! Everything that leaves the process goes through this crate. The
//! orchestration and signing crates only ever see normalized
//! [`Outcome`](gateway::Outcome) values.
//!
//! # Modules
//!
//! - [`constants`]: timeouts, default endpoints, sentinel ids
//! - [`error`]: `GatewayError`
//! - [`types`]: `Network`, `DerivationCoordinate`, `TransferRequest`, `ArtifactPaths`
//! - [`gateway`]: `CommandGateway` trait and the process-backed implementation
//! - [`runner`]: RGB protocol and bitcoin node runners on top of the gateway

pub mod constants;
pub mod error;
pub mod gateway;
pub mod runner;
pub mod types;

pub use error::GatewayError;
pub use gateway::{CommandGateway, Invocation, Outcome, ProcessGateway};
pub use runner::{BitcoinCli, ChainNode, ProtocolRunner, RgbCli};
pub use types::{ArtifactPaths, DerivationCoordinate, Network, TransferRequest};
