//! Simulated entanglement network
//!
//! Every run gets its own state vector, shared by both parties so the halves
//! of a Bell pair stay correlated. Runs never touch each other's qubits, so
//! the simulator's capacity bounds a single run, not the number in flight. A
//! two-qubit gate spanning two registers merges them first.
//!
//! Pair halves created for a counterparty wait in a FIFO keyed by
//! `(party, run)` until that party receives them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use telepathy_core::{PairId, PartyId, QubitId, RunId, TelepathyError, TelepathyResult};
use telepathy_provider::{Connection, EntanglementProvider, Gate, Qubit};

use crate::fault::{FaultConfig, SimConfig, SimStats};
use crate::state::{StateVector, MAX_QUBITS};

/// Half of a pair waiting for its receiver
struct PendingHalf {
    qubit: QubitId,
    pair: PairId,
}

struct NetworkInner {
    registers: HashMap<RunId, StateVector>,
    homes: HashMap<QubitId, RunId>,
    rng: StdRng,
    faults: FaultConfig,
    refusals_left: u32,
    operations: u64,
    offline: bool,
    next_qubit: u64,
    next_pair: u64,
    pending: HashMap<(PartyId, RunId), VecDeque<PendingHalf>>,
    stats: SimStats,
}

impl NetworkInner {
    fn new(config: SimConfig) -> Self {
        NetworkInner {
            registers: HashMap::new(),
            homes: HashMap::new(),
            rng: StdRng::seed_from_u64(config.seed),
            refusals_left: config.faults.refused_connections,
            faults: config.faults,
            operations: 0,
            offline: false,
            next_qubit: 1,
            next_pair: 1,
            pending: HashMap::new(),
            stats: SimStats::default(),
        }
    }

    /// Account for one provider operation, failing once the provider is offline
    fn serve(&mut self) -> TelepathyResult<()> {
        if !self.offline {
            if let Some(limit) = self.faults.offline_after {
                if self.operations >= limit {
                    tracing::warn!(operations = self.operations, "simulated provider going offline");
                    self.offline = true;
                }
            }
        }
        if self.offline {
            return Err(TelepathyError::ResourceUnavailable(
                "simulated provider offline".into(),
            ));
        }
        self.operations += 1;
        Ok(())
    }

    fn new_qubit(&mut self, run: RunId) -> TelepathyResult<QubitId> {
        let id = QubitId::new(self.next_qubit);
        self.registers.entry(run).or_default().allocate(id)?;
        self.homes.insert(id, run);
        self.next_qubit += 1;
        Ok(id)
    }

    fn register(&mut self, id: QubitId) -> TelepathyResult<&mut StateVector> {
        self.homes
            .get(&id)
            .and_then(|run| self.registers.get_mut(run))
            .ok_or_else(|| TelepathyError::ResourceUnavailable(format!("{:?} is not live", id)))
    }

    /// Put `target` in the same register as `control`, merging if needed
    fn colocate(&mut self, control: QubitId, target: QubitId) -> TelepathyResult<()> {
        let home = |inner: &Self, id: QubitId| {
            inner.homes.get(&id).copied().ok_or_else(|| {
                TelepathyError::ResourceUnavailable(format!("{:?} is not live", id))
            })
        };
        let into = home(self, control)?;
        let from = home(self, target)?;
        if into == from {
            return Ok(());
        }

        let size = |inner: &Self, run: RunId| inner.registers.get(&run).map_or(0, StateVector::len);
        if size(self, into) + size(self, from) > MAX_QUBITS {
            return Err(TelepathyError::ResourceUnavailable(format!(
                "simulator capacity of {} qubits exhausted",
                MAX_QUBITS
            )));
        }

        let moved = self.registers.remove(&from).unwrap_or_default();
        let slots: Vec<QubitId> = self
            .homes
            .iter()
            .filter(|(_, run)| **run == from)
            .map(|(id, _)| *id)
            .collect();
        self.registers.entry(into).or_default().absorb(moved)?;
        for id in slots {
            self.homes.insert(id, into);
        }
        tracing::debug!(%into, %from, "registers merged");
        Ok(())
    }

    /// Trace a qubit out of its register. Never fails, even offline.
    fn release(&mut self, id: QubitId) {
        let Some(run) = self.homes.remove(&id) else {
            return;
        };
        if let Some(register) = self.registers.get_mut(&run) {
            let _ = register.measure(id, &mut self.rng);
            if register.is_empty() {
                self.registers.remove(&run);
            }
        }
        self.stats.qubits_released += 1;
        tracing::trace!(qubit = ?id, "released");
    }

    fn measure(&mut self, id: QubitId) -> TelepathyResult<bool> {
        let run = *self.homes.get(&id).ok_or_else(|| {
            TelepathyError::ResourceUnavailable(format!("{:?} is not live", id))
        })?;
        let register = self.registers.get_mut(&run).ok_or_else(|| {
            TelepathyError::ResourceUnavailable(format!("{:?} is not live", id))
        })?;
        let outcome = register.measure(id, &mut self.rng)?;
        if register.is_empty() {
            self.registers.remove(&run);
        }
        self.homes.remove(&id);
        Ok(outcome)
    }
}

/// In-process provider backed by a state-vector simulation
#[derive(Clone)]
pub struct SimulatedNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl SimulatedNetwork {
    pub fn new(config: SimConfig) -> Self {
        SimulatedNetwork {
            inner: Arc::new(Mutex::new(NetworkInner::new(config))),
        }
    }

    /// Reliable network with the given seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(SimConfig::with_seed(seed))
    }

    pub fn stats(&self) -> SimStats {
        self.inner.lock().stats.clone()
    }

    /// Qubits currently held anywhere on the network
    pub fn live_qubits(&self) -> usize {
        self.inner.lock().homes.len()
    }

    /// Registers currently holding live qubits
    pub fn live_registers(&self) -> usize {
        self.inner.lock().registers.len()
    }

    /// Pair halves created but not yet received
    pub fn pending_halves(&self) -> usize {
        self.inner.lock().pending.values().map(VecDeque::len).sum()
    }

    /// Simulate losing the provider
    pub fn go_offline(&self) {
        self.inner.lock().offline = true;
    }

    /// Bring the provider back and clear any operation limit
    pub fn restore(&self) {
        let mut inner = self.inner.lock();
        inner.offline = false;
        inner.faults.offline_after = None;
    }

    pub fn is_offline(&self) -> bool {
        self.inner.lock().offline
    }

    fn same_network(&self, other: &SimulatedNetwork) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl EntanglementProvider for SimulatedNetwork {
    type Connection = SimConnection;

    fn open(&self, party: PartyId, run: RunId) -> TelepathyResult<SimConnection> {
        let mut inner = self.inner.lock();
        if inner.refusals_left > 0 && !inner.offline {
            inner.refusals_left -= 1;
            inner.stats.connections_refused += 1;
            return Err(TelepathyError::ResourceUnavailable(format!(
                "connection refused for {}",
                party
            )));
        }
        inner.serve()?;
        inner.stats.connections_opened += 1;
        tracing::debug!(%party, %run, "connection opened");

        Ok(SimConnection {
            party,
            run,
            network: self.clone(),
            open: true,
        })
    }
}

/// A party's connection to the simulated network
pub struct SimConnection {
    party: PartyId,
    run: RunId,
    network: SimulatedNetwork,
    open: bool,
}

impl SimConnection {
    pub fn run(&self) -> RunId {
        self.run
    }

    fn ensure_open(&self) -> TelepathyResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(TelepathyError::ResourceUnavailable(format!(
                "connection for {} closed",
                self.party
            )))
        }
    }

    fn qubit(&self, id: QubitId, pair: Option<PairId>) -> SimQubit {
        SimQubit {
            id,
            pair,
            owner: self.party,
            network: self.network.clone(),
            live: true,
        }
    }
}

impl Connection for SimConnection {
    type Qubit = SimQubit;

    fn party(&self) -> PartyId {
        self.party
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn allocate(&mut self) -> TelepathyResult<SimQubit> {
        self.ensure_open()?;
        let id = {
            let mut inner = self.network.inner.lock();
            inner.serve()?;
            let id = inner.new_qubit(self.run)?;
            inner.stats.qubits_allocated += 1;
            id
        };
        Ok(self.qubit(id, None))
    }

    fn create_pair(
        &mut self,
        counterparty: PartyId,
        run: RunId,
    ) -> TelepathyResult<(SimQubit, PairId)> {
        self.ensure_open()?;
        let (local, pair) = {
            let mut inner = self.network.inner.lock();
            inner.serve()?;

            let local = inner.new_qubit(run)?;
            let remote = match inner.new_qubit(run) {
                Ok(id) => id,
                Err(e) => {
                    inner.release(local);
                    return Err(e);
                }
            };
            let register = inner.register(local)?;
            register.apply(local, Gate::H)?;
            register.cnot(local, remote)?;

            let pair = PairId::new(inner.next_pair);
            inner.next_pair += 1;
            inner
                .pending
                .entry((counterparty, run))
                .or_default()
                .push_back(PendingHalf {
                    qubit: remote,
                    pair,
                });
            inner.stats.pairs_created += 1;
            tracing::debug!(party = %self.party, %counterparty, %run, %pair, "pair created");
            (local, pair)
        };
        Ok((self.qubit(local, Some(pair)), pair))
    }

    fn receive_pair(&mut self, run: RunId) -> TelepathyResult<SimQubit> {
        self.ensure_open()?;
        let half = {
            let mut inner = self.network.inner.lock();
            inner.serve()?;
            let half = inner
                .pending
                .get_mut(&(self.party, run))
                .and_then(VecDeque::pop_front)
                .ok_or(TelepathyError::NoPendingPair(run))?;
            inner.stats.pairs_received += 1;
            tracing::debug!(party = %self.party, %run, pair = %half.pair, "pair received");
            half
        };
        Ok(self.qubit(half.qubit, Some(half.pair)))
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let mut inner = self.network.inner.lock();
        // Halves nobody will receive any more
        if let Some(orphans) = inner.pending.remove(&(self.party, self.run)) {
            for half in orphans {
                inner.release(half.qubit);
            }
        }
        inner.stats.connections_closed += 1;
        tracing::debug!(party = %self.party, run = %self.run, "connection closed");
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Qubit handle on the simulated network
pub struct SimQubit {
    id: QubitId,
    pair: Option<PairId>,
    owner: PartyId,
    network: SimulatedNetwork,
    live: bool,
}

impl SimQubit {
    pub fn owner(&self) -> PartyId {
        self.owner
    }
}

impl Qubit for SimQubit {
    fn id(&self) -> QubitId {
        self.id
    }

    fn pair(&self) -> Option<PairId> {
        self.pair
    }

    fn apply(&mut self, gate: Gate) -> TelepathyResult<()> {
        let mut inner = self.network.inner.lock();
        inner.serve()?;
        inner.register(self.id)?.apply(self.id, gate)?;
        inner.stats.gates_applied += 1;
        Ok(())
    }

    fn cnot(&mut self, target: &mut Self) -> TelepathyResult<()> {
        if self.owner != target.owner || !self.network.same_network(&target.network) {
            return Err(TelepathyError::NonLocalOperation {
                control: self.id,
                target: target.id,
            });
        }
        let mut inner = self.network.inner.lock();
        inner.serve()?;
        inner.colocate(self.id, target.id)?;
        inner.register(self.id)?.cnot(self.id, target.id)?;
        inner.stats.gates_applied += 1;
        Ok(())
    }

    fn measure(mut self) -> TelepathyResult<bool> {
        let outcome = {
            let mut inner = self.network.inner.lock();
            inner.serve()?;
            let outcome = inner.measure(self.id)?;
            inner.stats.measurements += 1;
            outcome
        };
        self.live = false;
        tracing::trace!(qubit = ?self.id, outcome, "measured");
        Ok(outcome)
    }
}

impl Drop for SimQubit {
    fn drop(&mut self) {
        if self.live {
            self.network.inner.lock().release(self.id);
        }
    }
}
