//! Qubit, connection and provider capabilities
//!
//! A provider hands out [`Connection`]s, one per party and run. A connection
//! creates or receives halves of Bell pairs and allocates local ancillas.
//! Every qubit it returns is an owned [`Qubit`] handle: gates borrow it
//! mutably, measurement consumes it, and dropping an unmeasured handle
//! releases the underlying resource.

use telepathy_core::{PairId, PartyId, QubitId, RunId, TelepathyResult};

/// Single-qubit operations the protocol needs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Hadamard; swaps the X and Z bases
    H,
    /// `(Y + Z)/√2`; swaps the Y and Z bases
    K,
    /// Bit flip
    X,
}

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Gate::H => "H",
            Gate::K => "K",
            Gate::X => "X",
        }
    }
}

/// Handle to one qubit held by a party
pub trait Qubit: Send + Sized {
    fn id(&self) -> QubitId;

    /// Correlation token if this qubit is half of a Bell pair
    fn pair(&self) -> Option<PairId>;

    fn apply(&mut self, gate: Gate) -> TelepathyResult<()>;

    /// Controlled-NOT with `self` as control; both qubits must be local
    fn cnot(&mut self, target: &mut Self) -> TelepathyResult<()>;

    /// Destructive Z-basis measurement
    fn measure(self) -> TelepathyResult<bool>;
}

/// A party's open connection to the provider
pub trait Connection: Send {
    type Qubit: Qubit + 'static;

    fn party(&self) -> PartyId;

    fn is_open(&self) -> bool;

    /// Fresh local qubit in `|0⟩`
    fn allocate(&mut self) -> TelepathyResult<Self::Qubit>;

    /// Create a Bell pair with `counterparty`, keeping the local half
    fn create_pair(
        &mut self,
        counterparty: PartyId,
        run: RunId,
    ) -> TelepathyResult<(Self::Qubit, PairId)>;

    /// Take the next half created for this party under `run`
    fn receive_pair(&mut self, run: RunId) -> TelepathyResult<Self::Qubit>;

    /// Close the connection; calling it again is a no-op
    fn close(&mut self);
}

/// Source of connections
pub trait EntanglementProvider: Send + Sync {
    type Connection: Connection + 'static;

    fn open(&self, party: PartyId, run: RunId) -> TelepathyResult<Self::Connection>;
}
