//! Telepathy Protocol - the magic-square game over two Bell pairs
//!
//! Each run proceeds in four stages:
//! 1. Validate the row and column selectors
//! 2. Open Alice's and Bob's sessions and distribute two Bell pairs
//! 3. Alice measures her row, Bob measures his column
//! 4. Evaluate agreement and both parity checks
//!
//! The blocking [`ProtocolRunner`] drives runs sequentially; executors that
//! want the two sides on separate threads use [`ProtocolRunner::open_run`].

pub mod evaluator;
pub mod session;
pub mod checks;
pub mod runner;

pub use evaluator::{evaluate, evaluate_str};
pub use session::PartySession;
pub use checks::CheckReport;
pub use runner::*;
