//! Connection retry policy
//!
//! The only retry layer in the system. Measurement calls are never retried.

use std::time::Duration;

use telepathy_core::{PartyId, RunId, TelepathyError, TelepathyResult};

use crate::EntanglementProvider;

/// Bounded attempts with a fixed pause between them
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no pause
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Open a connection, retrying only `ResourceUnavailable` failures.
///
/// Blocks the calling thread during backoff.
pub fn connect_with_retry<P: EntanglementProvider>(
    provider: &P,
    party: PartyId,
    run: RunId,
    policy: &RetryPolicy,
) -> TelepathyResult<P::Connection> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match provider.open(party, run) {
            Ok(conn) => {
                tracing::info!(%party, %run, attempt, "connected to provider");
                return Ok(conn);
            }
            Err(e) if e.is_resource_failure() => {
                tracing::warn!(%party, %run, attempt, "connection attempt failed: {}", e);
                if attempt < attempts && !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(TelepathyError::ConnectionFailed { party, attempts })
}
