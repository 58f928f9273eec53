//! Telepathy Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the magic-square protocol:
//! - Identifiers (RunId, PartyId, QubitId, PairId)
//! - Pauli observables and joint-measurement specifications
//! - The 3×3 measurement table and validated line indices
//! - Measurement results and the shared error type

pub mod id;
pub mod pauli;
pub mod table;
pub mod outcome;
pub mod error;

pub use id::*;
pub use pauli::*;
pub use table::*;
pub use outcome::*;
pub use error::*;
