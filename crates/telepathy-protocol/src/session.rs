//! Party sessions
//!
//! A [`PartySession`] is one player's view of a run: an open connection and
//! the two pair halves it holds. Alice *initiates* (creates both pairs for
//! Bob), Bob *accepts* (receives them in creation order). Either side then
//! measures one line of the shared table.
//!
//! Closing releases the halves and then the connection. It is idempotent
//! and also runs on drop, so an early `?` never leaks provider resources.

use std::sync::Arc;

use telepathy_core::{
    Axis, LineIndex, MeasurementResult, MeasurementTable, PairId, PartyId, Role, RunId,
    TelepathyError, TelepathyResult, SQUARE_SIZE,
};
use telepathy_provider::{Connection, Qubit};

use crate::evaluator::evaluate;

/// One party's connection and pair halves for a single run
pub struct PartySession<C: Connection> {
    party: PartyId,
    run: RunId,
    table: Arc<MeasurementTable>,
    connection: Option<C>,
    pair_one: Option<C::Qubit>,
    pair_two: Option<C::Qubit>,
}

impl<C: Connection> PartySession<C> {
    fn unbound(connection: C, run: RunId, table: Arc<MeasurementTable>) -> Self {
        PartySession {
            party: connection.party(),
            run,
            table,
            connection: Some(connection),
            pair_one: None,
            pair_two: None,
        }
    }

    /// Create both Bell pairs for the counterparty and keep the local halves
    pub fn initiate(
        connection: C,
        counterparty: PartyId,
        run: RunId,
        table: Arc<MeasurementTable>,
    ) -> TelepathyResult<Self> {
        let mut session = Self::unbound(connection, run, table);

        let conn = session
            .connection
            .as_mut()
            .ok_or(TelepathyError::SessionClosed)?;
        let (one, first) = conn.create_pair(counterparty, run)?;
        session.pair_one = Some(one);

        let conn = session
            .connection
            .as_mut()
            .ok_or(TelepathyError::SessionClosed)?;
        let (two, second) = conn.create_pair(counterparty, run)?;
        session.pair_two = Some(two);

        tracing::debug!(party = %session.party, %counterparty, %run, %first, %second, "pairs created");
        Ok(session)
    }

    /// Receive both halves the counterparty created for this run
    pub fn accept(connection: C, run: RunId, table: Arc<MeasurementTable>) -> TelepathyResult<Self> {
        let mut session = Self::unbound(connection, run, table);

        for slot in 0..2 {
            let conn = session
                .connection
                .as_mut()
                .ok_or(TelepathyError::SessionClosed)?;
            let half = conn.receive_pair(run)?;
            if slot == 0 {
                session.pair_one = Some(half);
            } else {
                session.pair_two = Some(half);
            }
        }

        tracing::debug!(party = %session.party, %run, pairs = ?session.pair_tokens(), "pairs accepted");
        Ok(session)
    }

    pub fn party(&self) -> PartyId {
        self.party
    }

    /// `None` for parties other than the two well-known ids
    pub fn role(&self) -> Option<Role> {
        Role::from_party(self.party)
    }

    pub fn run_id(&self) -> RunId {
        self.run
    }

    pub fn table(&self) -> &MeasurementTable {
        &self.table
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    /// Tokens of the two pairs this session holds halves of
    pub fn pair_tokens(&self) -> Option<[PairId; 2]> {
        let one = self.pair_one.as_ref()?.pair()?;
        let two = self.pair_two.as_ref()?.pair()?;
        Some([one, two])
    }

    pub fn measure_row(&mut self, row: LineIndex) -> TelepathyResult<MeasurementResult> {
        self.measure(Axis::Row, row)
    }

    pub fn measure_column(&mut self, col: LineIndex) -> TelepathyResult<MeasurementResult> {
        self.measure(Axis::Column, col)
    }

    /// Evaluate the three specs of one line, in table order
    pub fn measure(&mut self, axis: Axis, index: LineIndex) -> TelepathyResult<MeasurementResult> {
        let specs = self.table.specs_for(axis, index);
        let (Some(conn), Some(one), Some(two)) = (
            self.connection.as_mut(),
            self.pair_one.as_mut(),
            self.pair_two.as_mut(),
        ) else {
            return Err(TelepathyError::SessionClosed);
        };
        if !conn.is_open() {
            return Err(TelepathyError::SessionClosed);
        }

        let mut bits = [false; SQUARE_SIZE];
        for (bit, spec) in bits.iter_mut().zip(specs.iter()) {
            *bit = evaluate(conn, one, two, spec)?;
        }

        let result = MeasurementResult::new(axis, index, bits);
        tracing::debug!(party = %self.party, run = %self.run, %axis, %index, %result, "line measured");
        Ok(result)
    }

    /// Release both halves, then the connection
    pub fn close(&mut self) {
        self.pair_one.take();
        self.pair_two.take();
        if let Some(mut conn) = self.connection.take() {
            conn.close();
            tracing::debug!(party = %self.party, run = %self.run, "session closed");
        }
    }
}

impl<C: Connection> Drop for PartySession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telepathy_core::MAGIC_SQUARE;
    use telepathy_provider::EntanglementProvider;
    use telepathy_sim::{SimConnection, SimulatedNetwork};

    fn sessions(
        network: &SimulatedNetwork,
        run: RunId,
    ) -> (PartySession<SimConnection>, PartySession<SimConnection>) {
        let table = Arc::new(MAGIC_SQUARE);
        let alice_conn = network.open(Role::Alice.party_id(), run).unwrap();
        let alice = PartySession::initiate(alice_conn, PartyId::BOB, run, table.clone()).unwrap();
        let bob_conn = network.open(Role::Bob.party_id(), run).unwrap();
        let bob = PartySession::accept(bob_conn, run, table).unwrap();
        (alice, bob)
    }

    #[test]
    fn test_both_sides_hold_the_same_pairs() {
        let network = SimulatedNetwork::seeded(11);
        let (alice, bob) = sessions(&network, RunId::new(1));
        assert_eq!(alice.role(), Some(Role::Alice));
        assert_eq!(bob.role(), Some(Role::Bob));
        assert_eq!(bob.run_id(), RunId::new(1));

        let tokens = alice.pair_tokens().unwrap();
        assert_ne!(tokens[0], tokens[1]);
        assert_eq!(bob.pair_tokens(), Some(tokens));
        assert_eq!(network.live_qubits(), 4);
        assert_eq!(network.pending_halves(), 0);
    }

    #[test]
    fn test_line_parities_hold_on_each_side() {
        for seed in 0..8 {
            let network = SimulatedNetwork::seeded(seed);
            for line in LineIndex::ALL {
                let (mut alice, mut bob) = sessions(&network, RunId::new(line.get() as u64 + 1));
                assert!(alice.measure_row(line).unwrap().parity_holds());
                assert!(bob.measure_column(line).unwrap().parity_holds());
            }
            assert_eq!(network.live_qubits(), 0);
        }
    }

    #[test]
    fn test_remeasuring_a_line_repeats_outcomes() {
        let network = SimulatedNetwork::seeded(2);
        let (mut alice, _bob) = sessions(&network, RunId::new(1));
        let row = LineIndex::row(1).unwrap();

        let first = alice.measure_row(row).unwrap();
        let second = alice.measure_row(row).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_close_is_idempotent() {
        let network = SimulatedNetwork::seeded(4);
        let (mut alice, mut bob) = sessions(&network, RunId::new(1));

        alice.close();
        alice.close();
        assert!(alice.is_closed());
        assert_eq!(alice.pair_tokens(), None);
        assert_eq!(network.live_qubits(), 2);

        bob.close();
        assert_eq!(network.live_qubits(), 0);
        assert_eq!(network.stats().connections_closed, 2);
    }

    #[test]
    fn test_measure_after_close() {
        let network = SimulatedNetwork::seeded(4);
        let (mut alice, _bob) = sessions(&network, RunId::new(1));
        alice.close();

        let err = alice.measure_row(LineIndex::row(0).unwrap()).unwrap_err();
        assert_eq!(err, TelepathyError::SessionClosed);
    }

    #[test]
    fn test_accept_without_pairs_releases_connection() {
        let network = SimulatedNetwork::seeded(4);
        let run = RunId::new(9);
        let conn = network.open(Role::Bob.party_id(), run).unwrap();

        let err = PartySession::accept(conn, run, Arc::new(MAGIC_SQUARE)).err();
        assert_eq!(err, Some(TelepathyError::NoPendingPair(run)));
        assert_eq!(network.stats().connections_closed, 1);
    }

    #[test]
    fn test_drop_releases_everything() {
        let network = SimulatedNetwork::seeded(4);
        {
            let (_alice, _bob) = sessions(&network, RunId::new(1));
            assert_eq!(network.live_qubits(), 4);
        }
        assert_eq!(network.live_qubits(), 0);
        assert_eq!(network.stats().connections_closed, 2);
    }
}
