//! Run orchestration
//!
//! [`ProtocolRunner`] owns the provider handle, the shared table and the run
//! id counter. A run is opened in one step (both sessions, both pairs) and
//! executed in a second, so that executors can split the two sides across
//! threads while the blocking path here stays sequential.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use telepathy_core::{
    LineIndex, MeasurementResult, MeasurementTable, PairId, Role, RunId, TelepathyError,
    TelepathyResult,
};
use telepathy_provider::{connect_with_retry, Connection, EntanglementProvider, RetryPolicy};

use crate::checks::CheckReport;
use crate::session::PartySession;

/// Validated row and column selectors for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunRequest {
    pub row: LineIndex,
    pub col: LineIndex,
}

impl RunRequest {
    /// Reject out-of-range selectors before anything reaches the provider
    pub fn new(row: i64, col: i64) -> TelepathyResult<Self> {
        Ok(RunRequest {
            row: LineIndex::row(row)?,
            col: LineIndex::column(col)?,
        })
    }
}

impl fmt::Display for RunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} / column {}", self.row, self.col)
    }
}

/// Everything observed in one completed run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub run: RunId,
    pub request: RunRequest,
    /// Alice's row outcome
    pub alice: MeasurementResult,
    /// Bob's column outcome
    pub bob: MeasurementResult,
    /// Pair tokens held by Alice
    pub pairs: [PairId; 2],
    pub checks: CheckReport,
}

impl RunReport {
    pub fn new(
        run: RunId,
        request: RunRequest,
        pairs: [PairId; 2],
        alice: MeasurementResult,
        bob: MeasurementResult,
    ) -> Self {
        let checks = CheckReport::evaluate(&alice, &bob);
        RunReport {
            run,
            request,
            alice,
            bob,
            pairs,
            checks,
        }
    }

    /// Log the outcome at `info`, or `warn` when a check failed
    pub fn log(&self) {
        if self.checks.all_passed() {
            tracing::info!(
                run = %self.run,
                alice = %self.alice,
                bob = %self.bob,
                "run complete: {}",
                self.checks
            );
        } else {
            tracing::warn!(
                run = %self.run,
                alice = %self.alice,
                bob = %self.bob,
                failed = ?self.checks.failures(),
                "run complete: {}",
                self.checks
            );
        }
    }
}

/// A run whose sessions are open and whose pairs are distributed
pub struct OpenRun<C: Connection> {
    pub run: RunId,
    pub request: RunRequest,
    pub pairs: [PairId; 2],
    pub alice: PartySession<C>,
    pub bob: PartySession<C>,
}

impl<C: Connection> OpenRun<C> {
    /// Measure Alice's row then Bob's column on this thread
    pub fn execute(self) -> TelepathyResult<RunReport> {
        let span = tracing::info_span!("run", run = %self.run);
        let _enter = span.enter();

        let OpenRun {
            run,
            request,
            pairs,
            mut alice,
            mut bob,
        } = self;

        let measured = alice
            .measure_row(request.row)
            .and_then(|ma| Ok((ma, bob.measure_column(request.col)?)));
        alice.close();
        bob.close();

        match measured {
            Ok((ma, mb)) => {
                let report = RunReport::new(run, request, pairs, ma, mb);
                report.log();
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(%request, "run abandoned: {}", e);
                Err(e)
            }
        }
    }
}

/// Runner settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Connection retry policy for both parties
    pub retry: RetryPolicy,
    /// Id of the first run
    pub first_run_id: RunId,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            retry: RetryPolicy::default(),
            first_run_id: RunId::new(1),
        }
    }
}

/// Blocking protocol driver over an entanglement provider
pub struct ProtocolRunner<P: EntanglementProvider> {
    provider: Arc<P>,
    table: Arc<MeasurementTable>,
    retry: RetryPolicy,
    next_run: AtomicU64,
}

impl<P: EntanglementProvider> ProtocolRunner<P> {
    /// Runner over the magic square with default settings
    pub fn new(provider: P) -> Self {
        Self::with_config(
            Arc::new(provider),
            Arc::new(MeasurementTable::default()),
            RunnerConfig::default(),
        )
    }

    pub fn with_config(
        provider: Arc<P>,
        table: Arc<MeasurementTable>,
        config: RunnerConfig,
    ) -> Self {
        ProtocolRunner {
            provider,
            table,
            retry: config.retry,
            next_run: AtomicU64::new(config.first_run_id.0),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn table(&self) -> &Arc<MeasurementTable> {
        &self.table
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn allocate_run(&self) -> RunId {
        RunId::new(self.next_run.fetch_add(1, Ordering::Relaxed))
    }

    /// Connect both parties and distribute the two pairs for a new run.
    ///
    /// On any failure the sessions opened so far are closed before returning.
    pub fn open_run(&self, request: RunRequest) -> TelepathyResult<OpenRun<P::Connection>> {
        let run = self.allocate_run();
        let span = tracing::info_span!("run", %run);
        let _enter = span.enter();

        let opened = self.open_sessions(run);
        let (alice, bob) = match opened {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(%request, "run abandoned while opening: {}", e);
                return Err(e);
            }
        };

        let pairs = alice.pair_tokens().ok_or_else(|| {
            TelepathyError::ResourceUnavailable(format!("{} produced untagged pair halves", run))
        })?;
        tracing::debug!(%request, ?pairs, "run opened");

        Ok(OpenRun {
            run,
            request,
            pairs,
            alice,
            bob,
        })
    }

    fn open_sessions(
        &self,
        run: RunId,
    ) -> TelepathyResult<(PartySession<P::Connection>, PartySession<P::Connection>)> {
        let party_alice = Role::Alice.party_id();
        let party_bob = Role::Bob.party_id();

        // Both connections exist before any pair does, so closing Bob's side
        // always reclaims halves that were never received
        let mut alice_conn = connect_with_retry(&*self.provider, party_alice, run, &self.retry)?;
        let mut bob_conn = match connect_with_retry(&*self.provider, party_bob, run, &self.retry) {
            Ok(conn) => conn,
            Err(e) => {
                alice_conn.close();
                return Err(e);
            }
        };

        let alice = match PartySession::initiate(alice_conn, party_bob, run, self.table.clone()) {
            Ok(session) => session,
            Err(e) => {
                bob_conn.close();
                return Err(e);
            }
        };
        let bob = PartySession::accept(bob_conn, run, self.table.clone())?;

        Ok((alice, bob))
    }

    /// Open and execute one run
    pub fn run(&self, request: RunRequest) -> TelepathyResult<RunReport> {
        self.open_run(request)?.execute()
    }

    /// Validate the selectors, then open and execute one run
    pub fn run_single(&self, row: i64, col: i64) -> TelepathyResult<RunReport> {
        let request = RunRequest::new(row, col)?;
        self.run(request)
    }

    /// Open every run before measuring any of them.
    ///
    /// Each run has its own id and sessions; a failed run does not stop the
    /// others. Results come back in request order.
    pub fn run_interleaved(&self, requests: &[RunRequest]) -> Vec<TelepathyResult<RunReport>> {
        let opened: Vec<_> = requests.iter().map(|r| self.open_run(*r)).collect();
        opened
            .into_iter()
            .map(|open| open.and_then(OpenRun::execute))
            .collect()
    }

    /// Two interleaved runs from raw selectors.
    ///
    /// Both selector pairs are validated before either run touches the
    /// provider.
    pub fn run_paired(
        &self,
        first: (i64, i64),
        second: (i64, i64),
    ) -> TelepathyResult<(TelepathyResult<RunReport>, TelepathyResult<RunReport>)> {
        let first = RunRequest::new(first.0, first.1)?;
        let second = RunRequest::new(second.0, second.1)?;

        let mut results = self.run_interleaved(&[first, second]).into_iter();
        match (results.next(), results.next()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(TelepathyError::TaskFailed(
                "paired run lost a result".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;
    use telepathy_core::{Axis, MeasurementSpec};
    use telepathy_sim::{FaultConfig, SimConfig, SimulatedNetwork};

    fn runner(network: &SimulatedNetwork) -> ProtocolRunner<SimulatedNetwork> {
        ProtocolRunner::with_config(
            Arc::new(network.clone()),
            Arc::new(MeasurementTable::default()),
            RunnerConfig {
                retry: RetryPolicy::new(3, Duration::ZERO),
                first_run_id: RunId::new(1),
            },
        )
    }

    #[test]
    fn test_every_cell_passes_all_checks() {
        for seed in 0..4 {
            let network = SimulatedNetwork::seeded(seed);
            let runner = runner(&network);
            for row in 0..3 {
                for col in 0..3 {
                    let report = runner.run_single(row, col).unwrap();
                    assert!(
                        report.checks.all_passed(),
                        "seed {} cell ({}, {}): {}",
                        seed,
                        row,
                        col,
                        report.checks
                    );
                }
            }
            assert_eq!(network.live_qubits(), 0);
        }
    }

    #[test]
    fn test_center_cell() {
        let network = SimulatedNetwork::seeded(21);
        let runner = runner(&network);

        let request = RunRequest::new(1, 1).unwrap();
        let row: Vec<String> = runner
            .table()
            .specs_for_row(request.row)
            .iter()
            .map(MeasurementSpec::to_string)
            .collect();
        let col: Vec<String> = runner
            .table()
            .specs_for_column(request.col)
            .iter()
            .map(MeasurementSpec::to_string)
            .collect();
        assert_eq!(row, ["-XZ", "+YY", "-ZX"]);
        assert_eq!(col, ["+XX", "+YY", "+ZZ"]);

        let report = runner.run(request).unwrap();
        assert_eq!(report.alice.axis, Axis::Row);
        assert_eq!(report.bob.axis, Axis::Column);
        assert_eq!(
            report.alice.bit(request.col),
            report.bob.bit(request.row)
        );
    }

    #[test]
    fn test_out_of_range_never_reaches_provider() {
        let network = SimulatedNetwork::seeded(1);
        let runner = runner(&network);

        for (row, col) in [(3, 0), (0, 3), (-1, 1), (1, -1)] {
            assert!(matches!(
                runner.run_single(row, col),
                Err(TelepathyError::IndexError { .. })
            ));
        }
        assert!(runner.run_paired((0, 0), (0, 3)).is_err());
        assert!(network.stats().is_untouched());
    }

    #[test]
    fn test_run_ids_increase_from_base() {
        let network = SimulatedNetwork::seeded(5);
        let runner = ProtocolRunner::with_config(
            Arc::new(network),
            Arc::new(MeasurementTable::default()),
            RunnerConfig {
                retry: RetryPolicy::no_retry(),
                first_run_id: RunId::new(100),
            },
        );

        let first = runner.run_single(0, 0).unwrap();
        let second = runner.run_single(2, 2).unwrap();
        assert_eq!(first.run, RunId::new(100));
        assert_eq!(second.run, RunId::new(101));
    }

    #[test]
    fn test_paired_runs_are_independent() {
        let network = SimulatedNetwork::seeded(8);
        let runner = runner(&network);

        let (first, second) = runner.run_paired((0, 2), (2, 0)).unwrap();
        let first = first.unwrap();
        let second = second.unwrap();

        assert_ne!(first.run, second.run);
        assert!(first.pairs.iter().all(|p| !second.pairs.contains(p)));
        assert_eq!(first.request, RunRequest::new(0, 2).unwrap());
        assert_eq!(second.request, RunRequest::new(2, 0).unwrap());
        assert!(first.checks.all_passed());
        assert!(second.checks.all_passed());
        assert_eq!(network.live_qubits(), 0);
    }

    #[test]
    fn test_interleaved_runs_hold_resources_together() {
        let network = SimulatedNetwork::seeded(8);
        let runner = runner(&network);

        let requests: Vec<_> = (0..3).map(|i| RunRequest::new(i, 2 - i).unwrap()).collect();
        let opened: Vec<_> = requests
            .iter()
            .map(|r| runner.open_run(*r).unwrap())
            .collect();
        // Four halves per open run, one register each
        assert_eq!(network.live_qubits(), 12);
        assert_eq!(network.live_registers(), 3);

        for open in opened {
            assert!(open.execute().unwrap().checks.all_passed());
        }
        assert_eq!(network.live_qubits(), 0);
    }

    #[test]
    fn test_many_interleaved_runs_all_complete() {
        let network = SimulatedNetwork::seeded(12);
        let runner = runner(&network);

        // Two rounds of every cell, all open at once
        let requests: Vec<_> = (0..18)
            .map(|i| RunRequest::new(i % 3, (i / 3) % 3).unwrap())
            .collect();
        let results = runner.run_interleaved(&requests);

        assert_eq!(results.len(), requests.len());
        for (result, request) in results.into_iter().zip(&requests) {
            let report = result.unwrap();
            assert_eq!(report.request, *request);
            assert!(report.checks.all_passed(), "{}", report.checks);
        }
        assert_eq!(network.live_qubits(), 0);
        assert_eq!(network.live_registers(), 0);
    }

    #[test]
    fn test_flaky_provider_is_retried() {
        let network =
            SimulatedNetwork::new(SimConfig::with_seed(2).faults(FaultConfig::flaky_connect(2)));
        let runner = runner(&network);

        let report = runner.run_single(2, 1).unwrap();
        assert!(report.checks.all_passed());
        assert_eq!(network.stats().connections_refused, 2);
    }

    #[test]
    fn test_exhausted_retries_fail_the_run() {
        let network =
            SimulatedNetwork::new(SimConfig::with_seed(2).faults(FaultConfig::flaky_connect(10)));
        let runner = runner(&network);

        let err = runner.run_single(0, 0).unwrap_err();
        assert_eq!(
            err,
            TelepathyError::ConnectionFailed {
                party: Role::Alice.party_id(),
                attempts: 3,
            }
        );
        assert_eq!(network.live_qubits(), 0);
    }

    #[test]
    fn test_provider_loss_abandons_run_cleanly() {
        // Enough operations to open the run, not enough to measure it
        let network =
            SimulatedNetwork::new(SimConfig::with_seed(4).faults(FaultConfig::offline_after(10)));
        let runner = runner(&network);

        let err = runner.run_single(1, 2).unwrap_err();
        assert!(err.is_resource_failure());
        assert_eq!(network.live_qubits(), 0);
        assert_eq!(network.pending_halves(), 0);

        let stats = network.stats();
        assert_eq!(stats.connections_opened, stats.connections_closed);
    }

    #[test]
    fn test_failure_while_distributing_pairs_leaks_nothing() {
        // Both connects and the first pair succeed, the second pair fails
        let network =
            SimulatedNetwork::new(SimConfig::with_seed(4).faults(FaultConfig::offline_after(3)));
        let runner = runner(&network);

        assert!(runner.run_single(0, 1).unwrap_err().is_resource_failure());
        assert_eq!(network.stats().pairs_created, 1);
        assert_eq!(network.live_qubits(), 0);
        assert_eq!(network.pending_halves(), 0);
    }

    #[test]
    fn test_failed_run_does_not_stop_the_next() {
        let network = SimulatedNetwork::seeded(6);
        let runner = runner(&network);

        let mut opened = runner.open_run(RunRequest::new(0, 0).unwrap()).unwrap();
        opened.alice.close();
        assert_eq!(opened.execute().err(), Some(TelepathyError::SessionClosed));

        assert!(runner.run_single(0, 0).unwrap().checks.all_passed());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_checks_hold_for_any_seed(seed in any::<u64>(), row in 0i64..3, col in 0i64..3) {
            let network = SimulatedNetwork::seeded(seed);
            let report = runner(&network).run_single(row, col).unwrap();
            prop_assert!(report.checks.all_passed());
            prop_assert_eq!(network.live_qubits(), 0);
        }
    }
}
