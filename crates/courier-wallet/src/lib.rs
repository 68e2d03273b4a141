//! # courier-wallet: Finding the key that signs a transfer.
//!
//! The sender's funds sit under one of a handful of derivation paths, and
//! the transfer artifact does not say which. This crate derives candidate
//! keys from the master key and tries them against the node wallet in a
//! fixed order until one produces a complete, submittable transaction.
//!
//! # Modules
//!
//! - [`error`]: `DerivationError`, `SigningError`
//! - [`keys`]: `MasterKey`, `CandidateKey`, WIF encoding
//! - [`submission`]: three-way classification of broadcast results
//! - [`search`]: `SearchPlan` and the `SigningSearch` engine

pub mod error;
pub mod keys;
pub mod search;
pub mod submission;

pub use error::{DerivationError, SigningError};
pub use keys::{CandidateKey, MasterKey};
pub use search::{SearchPlan, SignedTransaction, SigningSearch};
pub use submission::{Submission, TransactionId};
