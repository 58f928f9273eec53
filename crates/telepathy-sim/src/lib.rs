//! Telepathy Simulator - in-process entanglement provider
//!
//! This crate provides:
//! - A state-vector simulation per run, so runs in flight never share capacity
//! - Bell-pair distribution keyed by party and run
//! - Seeded measurement outcomes for reproducible runs
//! - Fault injection (refused connections, provider going offline)
//! - Operation statistics

pub mod state;
pub mod fault;
pub mod network;

pub use state::StateVector;
pub use fault::*;
pub use network::*;
