//! Telepathy Provider Layer - access to entangled qubits
//!
//! This crate provides:
//! - The qubit capability (`Qubit`): single-qubit gates, local CNOT, Z readout
//! - Per-party connections that distribute and receive Bell pairs
//! - The provider entry point that opens connections
//! - Bounded connection retry with fixed backoff

pub mod capability;
pub mod retry;

pub use capability::*;
pub use retry::{connect_with_retry, RetryPolicy};
