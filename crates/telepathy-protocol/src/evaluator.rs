//! Joint measurement evaluator
//!
//! Measures `±P⊗Q` on two local qubits by copying the parity of their
//! eigenvalues onto a fresh ancilla:
//!
//! ```text
//! target ──[R]──●──[R]──       R = H for X, K for Y, none for Z
//!               │
//! ancilla ──────⊕────── ... ──[X if -]──[M]
//! ```
//!
//! `R` is self-inverse, so each target leaves in the same eigenspace it was
//! projected into and can be probed again by the next spec of the line.
//! `I` skips the target entirely.

use telepathy_core::{MeasurementSpec, Pauli, TelepathyResult};
use telepathy_provider::{Connection, Gate, Qubit};

/// Rotation that maps the Pauli's eigenbasis onto the Z basis
fn basis_rotation(basis: Pauli) -> Option<Gate> {
    match basis {
        Pauli::X => Some(Gate::H),
        Pauli::Y => Some(Gate::K),
        Pauli::I | Pauli::Z => None,
    }
}

/// Accumulate the `basis` eigenvalue of `target` into `ancilla`
fn transfer_basis<Q: Qubit>(target: &mut Q, ancilla: &mut Q, basis: Pauli) -> TelepathyResult<()> {
    if basis.is_identity() {
        return Ok(());
    }
    let rotation = basis_rotation(basis);

    if let Some(gate) = rotation {
        target.apply(gate)?;
    }
    target.cnot(ancilla)?;
    if let Some(gate) = rotation {
        target.apply(gate)?;
    }
    Ok(())
}

/// Measure `spec` on `(qubit_a, qubit_b)` and return the outcome bit.
///
/// The ancilla is allocated from `connection` and is released on every
/// return path: measured on success, dropped on error.
pub fn evaluate<C: Connection>(
    connection: &mut C,
    qubit_a: &mut C::Qubit,
    qubit_b: &mut C::Qubit,
    spec: &MeasurementSpec,
) -> TelepathyResult<bool> {
    let mut ancilla = connection.allocate()?;

    transfer_basis(qubit_a, &mut ancilla, spec.basis_a)?;
    transfer_basis(qubit_b, &mut ancilla, spec.basis_b)?;
    if spec.sign.is_negative() {
        ancilla.apply(Gate::X)?;
    }

    let bit = ancilla.measure()?;
    tracing::debug!(%spec, bit, "joint measurement");
    Ok(bit)
}

/// Parse `text` (e.g. `"-XZ"`) and evaluate it.
///
/// Parsing happens before the ancilla is allocated, so a malformed spec
/// never reaches the provider.
pub fn evaluate_str<C: Connection>(
    connection: &mut C,
    qubit_a: &mut C::Qubit,
    qubit_b: &mut C::Qubit,
    text: &str,
) -> TelepathyResult<bool> {
    let spec = MeasurementSpec::parse(text)?;
    evaluate(connection, qubit_a, qubit_b, &spec)
}
