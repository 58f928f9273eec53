//! Seed sweep harness
//!
//! Plays every requested cell against a fresh simulated network per seed and
//! tallies wins, failed checks, run errors and leaked qubits.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use telepathy_core::{LineIndex, MeasurementTable, TelepathyError, SQUARE_SIZE};
use telepathy_protocol::{ProtocolRunner, RunReport, RunRequest, RunnerConfig};
use telepathy_provider::RetryPolicy;
use telepathy_sim::{FaultConfig, SimConfig, SimulatedNetwork};

use crate::classical::CELL_COUNT;

// ============================================================================
// SWEEP CONFIGURATION
// ============================================================================

/// What a sweep plays
#[derive(Clone, Debug)]
pub struct SweepConfig {
    /// One simulated network per seed
    pub seeds: Vec<u64>,
    /// Cells played on every network
    pub cells: Vec<RunRequest>,
    /// Faults injected into every network
    pub faults: FaultConfig,
    /// Connection retry policy
    pub retry: RetryPolicy,
}

/// Every cell of the square, row by row
pub fn all_cells() -> Vec<RunRequest> {
    LineIndex::ALL
        .iter()
        .flat_map(|&row| LineIndex::ALL.iter().map(move |&col| RunRequest { row, col }))
        .collect()
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            seeds: (0..8).collect(),
            cells: all_cells(),
            faults: FaultConfig::reliable(),
            retry: RetryPolicy::no_retry(),
        }
    }
}

impl SweepConfig {
    /// One seed, every cell
    pub fn minimal() -> Self {
        SweepConfig {
            seeds: vec![0],
            ..Default::default()
        }
    }

    pub fn standard() -> Self {
        SweepConfig::default()
    }

    /// Many seeds drawn from a fixed generator
    pub fn stress() -> Self {
        let mut rng = StdRng::seed_from_u64(0x7e1e);
        SweepConfig {
            seeds: (0..64).map(|_| rng.gen()).collect(),
            ..Default::default()
        }
    }

    pub fn with_faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cells(mut self, cells: Vec<RunRequest>) -> Self {
        self.cells = cells;
        self
    }
}

// ============================================================================
// SWEEP RESULT
// ============================================================================

/// Outcome of a sweep
#[derive(Clone, Debug, Default)]
pub struct SweepResult {
    /// Runs attempted
    pub runs: usize,
    /// Runs where every check passed
    pub wins: usize,
    /// Wins per cell, indexed `[row][col]`
    pub cell_wins: [[usize; SQUARE_SIZE]; SQUARE_SIZE],
    /// Completed runs with a failed check
    pub failed_checks: Vec<(u64, RunReport)>,
    /// Runs that ended in an error
    pub errors: Vec<(u64, RunRequest, TelepathyError)>,
    /// Qubits still live after a seed's runs finished
    pub leaked_qubits: usize,
}

impl SweepResult {
    /// Every run completed, won, and released its qubits
    pub fn passed(&self) -> bool {
        self.wins == self.runs && self.errors.is_empty() && self.leaked_qubits == 0
    }

    pub fn win_rate(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.wins as f64 / self.runs as f64
    }

    /// Distinct cells won at least once
    pub fn cells_won(&self) -> usize {
        self.cell_wins.iter().flatten().filter(|&&n| n > 0).count()
    }
}

impl fmt::Display for SweepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} runs won ({}/{} cells), {} failed checks, {} errors, {} leaked qubits",
            self.wins,
            self.runs,
            self.cells_won(),
            CELL_COUNT,
            self.failed_checks.len(),
            self.errors.len(),
            self.leaked_qubits
        )
    }
}

// ============================================================================
// SWEEP HARNESS
// ============================================================================

/// Plays a [`SweepConfig`] against the simulator
pub struct SweepHarness {
    config: SweepConfig,
}

impl SweepHarness {
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    fn network(&self, seed: u64) -> SimulatedNetwork {
        SimulatedNetwork::new(SimConfig::with_seed(seed).faults(self.config.faults.clone()))
    }

    pub fn run(&self) -> SweepResult {
        let mut result = SweepResult::default();

        for &seed in &self.config.seeds {
            let network = self.network(seed);
            let runner = ProtocolRunner::with_config(
                Arc::new(network.clone()),
                Arc::new(MeasurementTable::default()),
                RunnerConfig {
                    retry: self.config.retry.clone(),
                    ..Default::default()
                },
            );

            for &request in &self.config.cells {
                result.runs += 1;
                match runner.run(request) {
                    Ok(report) if report.checks.all_passed() => {
                        result.wins += 1;
                        result.cell_wins[request.row.get()][request.col.get()] += 1;
                    }
                    Ok(report) => result.failed_checks.push((seed, report)),
                    Err(e) => result.errors.push((seed, request, e)),
                }
            }
            result.leaked_qubits += network.live_qubits();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_all_cells() {
        let cells = all_cells();
        assert_eq!(cells.len(), CELL_COUNT);
        assert_eq!(cells[5], RunRequest::new(1, 2).unwrap());
    }

    #[test]
    fn test_minimal_sweep_wins_everything() {
        let result = SweepHarness::new(SweepConfig::minimal()).run();
        assert!(result.passed(), "{}", result);
        assert_eq!(result.runs, CELL_COUNT);
        assert_eq!(result.cells_won(), CELL_COUNT);
        assert_eq!(result.win_rate(), 1.0);
    }

    #[test]
    fn test_standard_sweep_wins_everything() {
        let result = SweepHarness::new(SweepConfig::standard()).run();
        assert!(result.passed(), "{}", result);
        assert_eq!(result.cell_wins, [[8; SQUARE_SIZE]; SQUARE_SIZE]);
    }

    #[test]
    fn test_refusals_absorbed_by_retry() {
        let config = SweepConfig::minimal()
            .with_faults(FaultConfig::flaky_connect(2))
            .with_retry(RetryPolicy::new(3, Duration::ZERO));
        let result = SweepHarness::new(config).run();
        assert!(result.passed(), "{}", result);
    }

    #[test]
    fn test_offline_provider_reports_errors_without_leaks() {
        let config = SweepConfig::minimal().with_faults(FaultConfig::offline_after(20));
        let result = SweepHarness::new(config).run();

        assert!(!result.passed());
        // Once offline, every later run fails too
        assert_eq!(result.wins + result.errors.len(), CELL_COUNT);
        for (_, _, e) in &result.errors {
            assert!(
                e.is_resource_failure() || matches!(e, TelepathyError::ConnectionFailed { .. }),
                "{}",
                e
            );
        }
        assert_eq!(result.leaked_qubits, 0);
    }
}
