//! Pauli observables and joint-measurement specifications
//!
//! A [`MeasurementSpec`] names a two-qubit observable `±P⊗Q` with
//! `P, Q ∈ {I, X, Y, Z}`. Its text form is three characters, e.g. `"-XZ"`.
//!
//! [`Observable`] carries the full Pauli-group element (including the
//! `i^k` phase) and is used to check products and commutation.

use std::fmt;
use std::str::FromStr;

use crate::{TelepathyError, TelepathyResult};

/// Single-qubit Pauli operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    pub fn as_char(self) -> char {
        match self {
            Pauli::I => 'I',
            Pauli::X => 'X',
            Pauli::Y => 'Y',
            Pauli::Z => 'Z',
        }
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        self == Pauli::I
    }

    /// Product `self · other` as `(k, P)` meaning `i^k · P`
    pub fn mul(self, other: Pauli) -> (u8, Pauli) {
        use Pauli::*;
        match (self, other) {
            (I, p) | (p, I) => (0, p),
            (X, X) | (Y, Y) | (Z, Z) => (0, I),
            (X, Y) => (1, Z),
            (Y, Z) => (1, X),
            (Z, X) => (1, Y),
            (Y, X) => (3, Z),
            (Z, Y) => (3, X),
            (X, Z) => (3, Y),
        }
    }

    /// Whether two single-qubit Paulis commute
    #[inline]
    pub fn commutes_with(self, other: Pauli) -> bool {
        self.is_identity() || other.is_identity() || self == other
    }
}

impl TryFrom<char> for Pauli {
    type Error = TelepathyError;

    fn try_from(c: char) -> TelepathyResult<Self> {
        match c {
            'I' => Ok(Pauli::I),
            'X' => Ok(Pauli::X),
            'Y' => Ok(Pauli::Y),
            'Z' => Ok(Pauli::Z),
            other => Err(TelepathyError::UnsupportedObservable(other)),
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Overall sign of a joint observable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn as_char(self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }

    /// Whether the readout bit must be flipped
    #[inline]
    pub fn is_negative(self) -> bool {
        self == Sign::Minus
    }
}

impl TryFrom<char> for Sign {
    type Error = TelepathyError;

    fn try_from(c: char) -> TelepathyResult<Self> {
        match c {
            '+' => Ok(Sign::Plus),
            '-' => Ok(Sign::Minus),
            other => Err(TelepathyError::InvalidSpec(format!(
                "sign must be '+' or '-', got {:?}",
                other
            ))),
        }
    }
}

/// Joint two-qubit measurement specification `sign · basis_a ⊗ basis_b`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementSpec {
    pub sign: Sign,
    pub basis_a: Pauli,
    pub basis_b: Pauli,
}

impl MeasurementSpec {
    pub const fn new(sign: Sign, basis_a: Pauli, basis_b: Pauli) -> Self {
        MeasurementSpec {
            sign,
            basis_a,
            basis_b,
        }
    }

    pub const fn plus(basis_a: Pauli, basis_b: Pauli) -> Self {
        Self::new(Sign::Plus, basis_a, basis_b)
    }

    pub const fn minus(basis_a: Pauli, basis_b: Pauli) -> Self {
        Self::new(Sign::Minus, basis_a, basis_b)
    }

    /// Parse the three-character text form (`"+XI"`)
    ///
    /// The sign is checked before the bases, so `"?XW"` reports the sign.
    pub fn parse(text: &str) -> TelepathyResult<Self> {
        let chars: Vec<char> = text.chars().collect();
        let &[sign, a, b] = chars.as_slice() else {
            return Err(TelepathyError::InvalidSpec(format!(
                "expected 3 characters, got {:?}",
                text
            )));
        };

        Ok(MeasurementSpec {
            sign: Sign::try_from(sign)?,
            basis_a: Pauli::try_from(a)?,
            basis_b: Pauli::try_from(b)?,
        })
    }

    /// The Pauli-group element this spec measures
    pub fn observable(&self) -> Observable {
        Observable {
            phase: if self.sign.is_negative() { 2 } else { 0 },
            a: self.basis_a,
            b: self.basis_b,
        }
    }

    /// Two joint observables commute iff they anticommute on an even number
    /// of qubits.
    pub fn commutes_with(&self, other: &MeasurementSpec) -> bool {
        let anti = [
            self.basis_a.commutes_with(other.basis_a),
            self.basis_b.commutes_with(other.basis_b),
        ]
        .iter()
        .filter(|c| !**c)
        .count();
        anti % 2 == 0
    }
}

impl FromStr for MeasurementSpec {
    type Err = TelepathyError;

    fn from_str(s: &str) -> TelepathyResult<Self> {
        MeasurementSpec::parse(s)
    }
}

impl fmt::Debug for MeasurementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spec({})", self)
    }
}

impl fmt::Display for MeasurementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.sign.as_char(),
            self.basis_a.as_char(),
            self.basis_b.as_char()
        )
    }
}

/// Two-qubit Pauli-group element `i^phase · a ⊗ b`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Observable {
    /// Exponent of `i`, modulo 4
    pub phase: u8,
    pub a: Pauli,
    pub b: Pauli,
}

impl Observable {
    pub const IDENTITY: Observable = Observable {
        phase: 0,
        a: Pauli::I,
        b: Pauli::I,
    };

    pub fn mul(self, other: Observable) -> Observable {
        let (ka, a) = self.a.mul(other.a);
        let (kb, b) = self.b.mul(other.b);
        Observable {
            phase: (self.phase + other.phase + ka + kb) % 4,
            a,
            b,
        }
    }

    /// `Some(false)` for `+I⊗I`, `Some(true)` for `-I⊗I`, otherwise `None`.
    ///
    /// For a product of commuting observables this is the XOR of their
    /// measurement outcomes.
    pub fn identity_parity(&self) -> Option<bool> {
        if self.a != Pauli::I || self.b != Pauli::I {
            return None;
        }
        match self.phase {
            0 => Some(false),
            2 => Some(true),
            _ => None,
        }
    }
}
