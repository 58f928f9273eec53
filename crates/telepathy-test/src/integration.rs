//! End-to-end scenarios
//!
//! Each scenario wires a simulated network, a runner and the shipped table
//! together and returns what it observed, so the same checks can back unit
//! tests, benches and the demo.

use std::sync::Arc;
use std::time::Duration;

use telepathy_core::{MeasurementTable, TelepathyResult};
use telepathy_protocol::{ProtocolRunner, RunReport, RunnerConfig};
use telepathy_provider::RetryPolicy;
use telepathy_runtime::{ConcurrentRunner, RuntimeConfig};
use telepathy_sim::{SimConfig, SimulatedNetwork};

use crate::classical::{best_classical_strategy, CELL_COUNT};
use crate::harness::{SweepConfig, SweepHarness, SweepResult};

/// Runner settings for tests: a few attempts, no pauses
pub fn test_runner_config() -> RunnerConfig {
    RunnerConfig {
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..Default::default()
    }
}

/// Runtime settings for tests: no pauses, generous deadline
pub fn test_runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        retry_attempts: 3,
        retry_backoff: Duration::ZERO,
        run_timeout: Duration::from_secs(10),
        ..Default::default()
    }
}

/// Blocking runner over a seeded network
pub fn seeded_runner(seed: u64) -> (SimulatedNetwork, ProtocolRunner<SimulatedNetwork>) {
    let network = SimulatedNetwork::new(SimConfig::with_seed(seed));
    let runner = ProtocolRunner::with_config(
        Arc::new(network.clone()),
        Arc::new(MeasurementTable::default()),
        test_runner_config(),
    );
    (network, runner)
}

/// Every cell over several seeds
pub fn test_all_cells_across_seeds() -> SweepResult {
    SweepHarness::new(SweepConfig::standard()).run()
}

/// Single run followed by a paired run, as the demo plays them
pub fn test_single_then_paired(
    seed: u64,
) -> TelepathyResult<(RunReport, TelepathyResult<RunReport>, TelepathyResult<RunReport>)> {
    let (_network, runner) = seeded_runner(seed);
    let single = runner.run_single(0, 0)?;
    let (first, second) = runner.run_paired((1, 1), (2, 2))?;
    Ok((single, first, second))
}

/// Cells won by the entangled protocol versus the best classical strategy
pub fn quantum_versus_classical(seed: u64) -> (usize, usize) {
    let config = SweepConfig {
        seeds: vec![seed],
        ..SweepConfig::minimal()
    };
    let quantum = SweepHarness::new(config).run().cells_won();
    let (_, classical) = best_classical_strategy();
    (quantum, classical)
}

/// The table the runner uses is the shipped one and passes validation
pub fn test_shipped_table() -> bool {
    let (_, runner) = seeded_runner(0);
    runner.table().validate().is_ok() && **runner.table() == MeasurementTable::default()
}
