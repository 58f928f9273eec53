//! Error types for the magic-square protocol

use thiserror::Error;

use crate::{Axis, PartyId, QubitId, RunId};

/// Core telepathy errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelepathyError {
    // Specification errors
    #[error("Unsupported observable: {0:?}")]
    UnsupportedObservable(char),

    #[error("Invalid measurement spec: {0}")]
    InvalidSpec(String),

    #[error("Inconsistent measurement table: {0}")]
    InconsistentTable(String),

    // Selector errors
    #[error("{axis} index {index} out of range (expected 0..=2)")]
    IndexError { axis: Axis, index: i64 },

    // Provider errors
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Connection failed for party {party} after {attempts} attempts")]
    ConnectionFailed { party: PartyId, attempts: u32 },

    #[error("No pending pair for run {0}")]
    NoPendingPair(RunId),

    #[error("Non-local operation between {control:?} and {target:?}")]
    NonLocalOperation { control: QubitId, target: QubitId },

    // Session errors
    #[error("Session closed")]
    SessionClosed,

    // Execution errors
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl TelepathyError {
    /// Whether the error means the provider could not serve the request.
    ///
    /// These are the only errors a connection retry policy may retry.
    pub fn is_resource_failure(&self) -> bool {
        matches!(self, TelepathyError::ResourceUnavailable(_))
    }

    /// Whether the error was raised before touching any provider resource.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TelepathyError::IndexError { .. }
                | TelepathyError::UnsupportedObservable(_)
                | TelepathyError::InvalidSpec(_)
        )
    }
}

/// Result type for telepathy operations
pub type TelepathyResult<T> = Result<T, TelepathyError>;
