//! Telepathy Test Harness - protocol validation against the simulator
//!
//! This crate provides:
//! - Seed sweeps over every cell of the square
//! - The classical baseline the protocol is measured against
//! - End-to-end scenarios for the blocking and async runners

pub mod classical;
pub mod harness;
pub mod integration;

pub use classical::*;
pub use harness::*;
pub use integration::*;
