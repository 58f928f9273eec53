//! Async run executor
//!
//! Provider calls block, so every provider interaction happens on a tokio
//! blocking task:
//!
//! 1. Validate the selectors (no task, no provider call)
//! 2. Open the run: connect both parties, distribute both pairs
//! 3. Measure Alice's row and Bob's column, on two tasks or one
//! 4. Check and report
//!
//! The whole run sits under the configured deadline. A run that misses it
//! is reported as `ResourceUnavailable`; its blocking work finishes in the
//! background and drops the sessions, which releases every provider resource.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use telepathy_core::{MeasurementTable, TelepathyError, TelepathyResult};
use telepathy_protocol::{OpenRun, ProtocolRunner, RunReport, RunRequest};
use telepathy_provider::EntanglementProvider;

use crate::config::RuntimeConfig;

/// Executor statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_timed_out: u64,
    /// Completed runs where at least one check failed
    pub checks_failed: u64,
}

/// Drives protocol runs on the tokio runtime
pub struct ConcurrentRunner<P: EntanglementProvider + 'static> {
    runner: Arc<ProtocolRunner<P>>,
    run_timeout: Duration,
    concurrent_sides: bool,
    stats: Arc<Mutex<RuntimeStats>>,
}

impl<P: EntanglementProvider + 'static> Clone for ConcurrentRunner<P> {
    fn clone(&self) -> Self {
        ConcurrentRunner {
            runner: self.runner.clone(),
            run_timeout: self.run_timeout,
            concurrent_sides: self.concurrent_sides,
            stats: self.stats.clone(),
        }
    }
}

async fn join_blocking<T>(handle: JoinHandle<TelepathyResult<T>>) -> TelepathyResult<T> {
    handle
        .await
        .map_err(|e| TelepathyError::TaskFailed(e.to_string()))?
}

impl<P: EntanglementProvider + 'static> ConcurrentRunner<P> {
    /// Executor over the magic square
    pub fn new(provider: P, config: &RuntimeConfig) -> Self {
        Self::with_table(Arc::new(provider), Arc::new(MeasurementTable::default()), config)
    }

    pub fn with_table(
        provider: Arc<P>,
        table: Arc<MeasurementTable>,
        config: &RuntimeConfig,
    ) -> Self {
        let runner = ProtocolRunner::with_config(provider, table, config.runner_config());
        ConcurrentRunner {
            runner: Arc::new(runner),
            run_timeout: config.run_timeout,
            concurrent_sides: config.concurrent_sides,
            stats: Arc::new(Mutex::new(RuntimeStats::default())),
        }
    }

    pub fn runner(&self) -> &ProtocolRunner<P> {
        &self.runner
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.lock().clone()
    }

    /// Validate the selectors, then execute one run
    pub async fn run_single(&self, row: i64, col: i64) -> TelepathyResult<RunReport> {
        let request = RunRequest::new(row, col)?;
        self.run(request).await
    }

    /// Execute one run under the deadline
    pub async fn run(&self, request: RunRequest) -> TelepathyResult<RunReport> {
        self.stats.lock().runs_started += 1;

        let span = tracing::info_span!("request", %request);
        let outcome = tokio::time::timeout(self.run_timeout, self.execute(request))
            .instrument(span)
            .await;

        let mut stats = self.stats.lock();
        match outcome {
            Ok(Ok(report)) => {
                stats.runs_completed += 1;
                if !report.checks.all_passed() {
                    stats.checks_failed += 1;
                }
                Ok(report)
            }
            Ok(Err(e)) => {
                stats.runs_failed += 1;
                Err(e)
            }
            Err(_) => {
                stats.runs_timed_out += 1;
                tracing::warn!(%request, timeout = ?self.run_timeout, "run abandoned: deadline exceeded");
                Err(TelepathyError::ResourceUnavailable(format!(
                    "{} exceeded its {:?} deadline",
                    request, self.run_timeout
                )))
            }
        }
    }

    async fn execute(&self, request: RunRequest) -> TelepathyResult<RunReport> {
        let runner = self.runner.clone();
        let open = join_blocking(tokio::task::spawn_blocking(move || runner.open_run(request))).await?;

        if self.concurrent_sides {
            Self::execute_sides(open).await
        } else {
            join_blocking(tokio::task::spawn_blocking(move || open.execute())).await
        }
    }

    /// Measure both sides at once, each on its own blocking task
    async fn execute_sides(open: OpenRun<P::Connection>) -> TelepathyResult<RunReport> {
        let OpenRun {
            run,
            request,
            pairs,
            mut alice,
            mut bob,
        } = open;

        let alice_task = tokio::task::spawn_blocking(move || {
            let measured = alice.measure_row(request.row);
            alice.close();
            measured
        });
        let bob_task = tokio::task::spawn_blocking(move || {
            let measured = bob.measure_column(request.col);
            bob.close();
            measured
        });

        let measured = tokio::try_join!(join_blocking(alice_task), join_blocking(bob_task));
        match measured {
            Ok((ma, mb)) => {
                let report = RunReport::new(run, request, pairs, ma, mb);
                report.log();
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(%run, %request, "run abandoned: {}", e);
                Err(e)
            }
        }
    }

    /// Execute every request as its own task; results come back in order.
    ///
    /// A failing or timed-out run does not affect the others.
    pub async fn run_concurrent(&self, requests: Vec<RunRequest>) -> Vec<TelepathyResult<RunReport>> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let this = self.clone();
                tokio::spawn(async move { this.run(request).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .unwrap_or_else(|e| Err(TelepathyError::TaskFailed(e.to_string()))),
            );
        }
        results
    }

    /// Two concurrent runs from raw selectors, validated before either starts
    pub async fn run_paired(
        &self,
        first: (i64, i64),
        second: (i64, i64),
    ) -> TelepathyResult<(TelepathyResult<RunReport>, TelepathyResult<RunReport>)> {
        let first = RunRequest::new(first.0, first.1)?;
        let second = RunRequest::new(second.0, second.1)?;

        let mut results = self.run_concurrent(vec![first, second]).await.into_iter();
        match (results.next(), results.next()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(TelepathyError::TaskFailed("paired run lost a result".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telepathy_core::{PartyId, RunId};
    use telepathy_sim::{FaultConfig, SimConfig, SimConnection, SimulatedNetwork};

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            retry_attempts: 3,
            retry_backoff: Duration::ZERO,
            run_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Simulated network whose connections take a while to open
    struct SlowNetwork {
        inner: SimulatedNetwork,
        delay: Duration,
    }

    impl EntanglementProvider for SlowNetwork {
        type Connection = SimConnection;

        fn open(&self, party: PartyId, run: RunId) -> TelepathyResult<SimConnection> {
            std::thread::sleep(self.delay);
            self.inner.open(party, run)
        }
    }

    #[tokio::test]
    async fn test_concurrent_sides_pass_every_cell() {
        let network = SimulatedNetwork::seeded(17);
        let executor = ConcurrentRunner::new(network.clone(), &fast_config());

        for row in 0..3 {
            for col in 0..3 {
                let report = executor.run_single(row, col).await.unwrap();
                assert!(report.checks.all_passed(), "{}", report.checks);
            }
        }
        assert_eq!(network.live_qubits(), 0);

        let stats = executor.stats();
        assert_eq!(stats.runs_completed, 9);
        assert_eq!(stats.checks_failed, 0);
    }

    #[tokio::test]
    async fn test_sequential_sides() {
        let network = SimulatedNetwork::seeded(3);
        let config = RuntimeConfig {
            concurrent_sides: false,
            ..fast_config()
        };
        let executor = ConcurrentRunner::new(network.clone(), &config);

        let report = executor.run_single(2, 0).await.unwrap();
        assert!(report.checks.all_passed());
        assert_eq!(network.live_qubits(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_are_independent() {
        let network = SimulatedNetwork::seeded(29);
        let executor = ConcurrentRunner::new(network.clone(), &fast_config());

        let requests: Vec<_> = (0..9)
            .map(|i| RunRequest::new(i / 3, i % 3).unwrap())
            .collect();
        let reports: Vec<_> = executor
            .run_concurrent(requests.clone())
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        for (report, request) in reports.iter().zip(&requests) {
            assert_eq!(report.request, *request);
            assert!(report.checks.all_passed());
        }
        let mut runs: Vec<_> = reports.iter().map(|r| r.run).collect();
        runs.sort();
        runs.dedup();
        assert_eq!(runs.len(), reports.len());

        let mut pairs: Vec<_> = reports.iter().flat_map(|r| r.pairs).collect();
        pairs.sort_by_key(|p| p.0);
        pairs.dedup();
        assert_eq!(pairs.len(), 2 * reports.len());
        assert_eq!(network.live_qubits(), 0);
    }

    #[tokio::test]
    async fn test_paired_validation_happens_first() {
        let network = SimulatedNetwork::seeded(1);
        let executor = ConcurrentRunner::new(network.clone(), &fast_config());

        let err = executor.run_paired((0, 0), (3, 0)).await.unwrap_err();
        assert!(matches!(err, TelepathyError::IndexError { .. }));
        assert!(network.stats().is_untouched());
        assert_eq!(executor.stats().runs_started, 0);

        let (first, second) = executor.run_paired((1, 1), (0, 2)).await.unwrap();
        assert!(first.unwrap().checks.all_passed());
        assert!(second.unwrap().checks.all_passed());
    }

    #[tokio::test]
    async fn test_provider_loss_is_reported_per_run() {
        let network =
            SimulatedNetwork::new(SimConfig::with_seed(5).faults(FaultConfig::offline_after(10)));
        // One side at a time, so nothing from the failed run is still in flight
        let config = RuntimeConfig {
            concurrent_sides: false,
            ..fast_config()
        };
        let executor = ConcurrentRunner::new(network.clone(), &config);

        let err = executor.run_single(1, 2).await.unwrap_err();
        assert!(err.is_resource_failure());
        assert_eq!(executor.stats().runs_failed, 1);

        network.restore();
        assert!(executor.run_single(1, 2).await.unwrap().checks.all_passed());
        assert_eq!(network.live_qubits(), 0);
    }

    #[tokio::test]
    async fn test_deadline_abandons_run_without_leaks() {
        let network = SimulatedNetwork::seeded(2);
        let slow = SlowNetwork {
            inner: network.clone(),
            delay: Duration::from_millis(150),
        };
        let config = RuntimeConfig {
            run_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let executor = ConcurrentRunner::new(slow, &config);

        let err = executor.run_single(0, 0).await.unwrap_err();
        assert!(err.is_resource_failure());
        assert_eq!(executor.stats().runs_timed_out, 1);

        // The abandoned blocking work finishes and drops its sessions
        for _ in 0..100 {
            let stats = network.stats();
            if stats.connections_opened == 2 && stats.connections_closed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let stats = network.stats();
        assert_eq!(stats.connections_opened, stats.connections_closed);
        assert_eq!(network.live_qubits(), 0);
    }
}
