//! End-to-end transfer scenarios for rgb-courier.
//!
//! The RGB engine and the bitcoin node are replaced by in-process stubs that
//! keep just enough state to behave like the real thing: the engine writes
//! artifacts, the node only signs once the right key has been imported.

pub mod helpers;
