//! # courier-transfer: Driving a transfer from invoice to broadcast.
//!
//! The [`Orchestrator`] walks a linear state machine:
//!
//! ```text
//! START → INVOICED → PACKAGED → VALIDATED → ACCEPTED → SIGNED → RECONCILED → DONE
//!                                                                        ↘ FAILED
//! ```
//!
//! Protocol steps fail fast. Signing retries internally across key
//! coordinates. Reconciliation never fails the run. Artifacts are removed
//! and a result record is written on every terminal path.
//!
//! # Modules
//!
//! - [`error`]: `TransferError`
//! - [`stage`]: `Stage` and the mutable `TransferState`
//! - [`reconcile`]: post-broadcast state check
//! - [`record`]: persisted result record and its sinks
//! - [`artifacts`]: best-effort artifact cleanup
//! - [`orchestrator`]: the state machine driver

pub mod artifacts;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod stage;

pub use error::TransferError;
pub use orchestrator::{Orchestrator, TransferReport};
pub use reconcile::{Reconciler, Verification};
pub use record::{JsonFileSink, RecordSink, ResultRecord};
pub use stage::{Stage, StageOutcome, TransferState};
