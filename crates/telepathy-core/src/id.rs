//! Identity types for the magic-square protocol
//!
//! All identifiers are 64-bit. Runs and parties are named by the caller;
//! qubits and pairs are named by the provider that owns them.

use std::fmt;

/// Run identity - binds both sessions of one protocol run to the same pairs
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RunId(pub u64);

impl RunId {
    pub const ZERO: RunId = RunId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        RunId(id)
    }

    /// The identifier following this one
    #[inline]
    pub fn next(self) -> Self {
        RunId(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run({})", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Party identity - one endpoint of the provider network
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PartyId(pub u64);

impl PartyId {
    pub const ALICE: PartyId = PartyId(0xA11CE);
    pub const BOB: PartyId = PartyId(0xB0B);

    #[inline]
    pub fn new(id: u64) -> Self {
        PartyId(id)
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({:x})", self.0)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PartyId::ALICE => f.write_str("Alice"),
            PartyId::BOB => f.write_str("Bob"),
            PartyId(id) => write!(f, "{:x}", id),
        }
    }
}

/// Protocol role of a party
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Row measurer; creates both pairs
    Alice,
    /// Column measurer; receives both pairs
    Bob,
}

impl Role {
    pub fn party_id(self) -> PartyId {
        match self {
            Role::Alice => PartyId::ALICE,
            Role::Bob => PartyId::BOB,
        }
    }

    /// Role bound to a well-known party id
    pub fn from_party(party: PartyId) -> Option<Role> {
        match party {
            PartyId::ALICE => Some(Role::Alice),
            PartyId::BOB => Some(Role::Bob),
            _ => None,
        }
    }

    pub fn counterparty(self) -> Role {
        match self {
            Role::Alice => Role::Bob,
            Role::Bob => Role::Alice,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Alice => "Alice",
            Role::Bob => "Bob",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Qubit identity - unique within one provider
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QubitId(pub u64);

impl QubitId {
    #[inline]
    pub fn new(id: u64) -> Self {
        QubitId(id)
    }
}

impl fmt::Debug for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qubit({})", self.0)
    }
}

/// Pair identity - correlation token shared by both halves of one Bell pair
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PairId(pub u64);

impl PairId {
    #[inline]
    pub fn new(id: u64) -> Self {
        PairId(id)
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pair({})", self.0)
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
