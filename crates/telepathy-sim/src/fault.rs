//! Fault injection for the simulated provider
//!
//! Simulates an unreliable provider:
//! - Refused connection attempts
//! - The provider going offline after a number of operations

/// Provider fault configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Connection attempts refused before the first one succeeds
    pub refused_connections: u32,
    /// Provider operations served before the provider goes offline
    pub offline_after: Option<u64>,
}

impl FaultConfig {
    /// No faults
    pub fn reliable() -> Self {
        FaultConfig::default()
    }

    /// Refuse the first `refusals` connection attempts
    pub fn flaky_connect(refusals: u32) -> Self {
        FaultConfig {
            refused_connections: refusals,
            offline_after: None,
        }
    }

    /// Go offline once `operations` provider operations have been served
    pub fn offline_after(operations: u64) -> Self {
        FaultConfig {
            refused_connections: 0,
            offline_after: Some(operations),
        }
    }
}

/// Simulator configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Seed for measurement outcomes
    pub seed: u64,
    /// Injected faults
    pub faults: FaultConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            seed: 0x5eed,
            faults: FaultConfig::reliable(),
        }
    }
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        SimConfig {
            seed,
            ..Default::default()
        }
    }

    pub fn faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }
}

/// Simulator statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    pub connections_opened: u64,
    pub connections_refused: u64,
    pub connections_closed: u64,
    pub pairs_created: u64,
    pub pairs_received: u64,
    pub qubits_allocated: u64,
    pub gates_applied: u64,
    pub measurements: u64,
    pub qubits_released: u64,
}

impl SimStats {
    /// Calls that reached the provider, successful or not
    pub fn provider_calls(&self) -> u64 {
        self.connections_opened
            + self.connections_refused
            + self.pairs_created
            + self.pairs_received
            + self.qubits_allocated
            + self.gates_applied
            + self.measurements
    }

    pub fn is_untouched(&self) -> bool {
        *self == SimStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(FaultConfig::reliable().offline_after, None);
        assert_eq!(FaultConfig::flaky_connect(3).refused_connections, 3);
        assert_eq!(FaultConfig::offline_after(10).offline_after, Some(10));

        let config = SimConfig::with_seed(9).faults(FaultConfig::flaky_connect(1));
        assert_eq!(config.seed, 9);
        assert_eq!(config.faults.refused_connections, 1);
    }

    #[test]
    fn test_stats_untouched() {
        let mut stats = SimStats::default();
        assert!(stats.is_untouched());
        stats.gates_applied += 1;
        assert!(!stats.is_untouched());
        assert_eq!(stats.provider_calls(), 1);
    }
}
