//! Dense state vector over a dynamic set of qubits
//!
//! Qubit `slots[k]` is bit `k` of the amplitude index. New qubits enter as
//! the highest bit in `|0⟩`; measured qubits are projected out and the
//! remaining bits are compacted.

use std::f64::consts::FRAC_1_SQRT_2;

use num_complex::Complex64;
use rand::Rng;

use telepathy_core::{QubitId, TelepathyError, TelepathyResult};
use telepathy_provider::Gate;

/// Largest number of qubits in one entangled register
pub const MAX_QUBITS: usize = 20;

/// Probabilities closer than this to 0 or 1 are treated as certain
const CERTAINTY_EPSILON: f64 = 1e-12;

type Matrix = [[Complex64; 2]; 2];

fn gate_matrix(gate: Gate) -> Matrix {
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
    let hi = Complex64::new(0.0, FRAC_1_SQRT_2);

    match gate {
        Gate::H => [[h, h], [h, -h]],
        Gate::K => [[h, -hi], [hi, -h]],
        Gate::X => [[zero, one], [one, zero]],
    }
}

#[derive(Clone, Debug)]
pub struct StateVector {
    amplitudes: Vec<Complex64>,
    slots: Vec<QubitId>,
}

impl StateVector {
    pub fn new() -> Self {
        StateVector {
            amplitudes: vec![Complex64::new(1.0, 0.0)],
            slots: Vec::new(),
        }
    }

    /// Number of live qubits
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: QubitId) -> bool {
        self.slots.contains(&id)
    }

    /// Sum of squared amplitudes; 1.0 up to rounding
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }

    fn slot(&self, id: QubitId) -> TelepathyResult<usize> {
        self.slots.iter().position(|&q| q == id).ok_or_else(|| {
            TelepathyError::ResourceUnavailable(format!("{:?} is not live", id))
        })
    }

    /// Add a qubit in `|0⟩`
    pub fn allocate(&mut self, id: QubitId) -> TelepathyResult<()> {
        if self.slots.len() >= MAX_QUBITS {
            return Err(TelepathyError::ResourceUnavailable(format!(
                "simulator capacity of {} qubits exhausted",
                MAX_QUBITS
            )));
        }
        let len = self.amplitudes.len();
        self.amplitudes.resize(len * 2, Complex64::new(0.0, 0.0));
        self.slots.push(id);
        Ok(())
    }

    /// Take `other`'s qubits into this state as a tensor product.
    ///
    /// `other` is left untouched when the combined size would exceed
    /// [`MAX_QUBITS`].
    pub fn absorb(&mut self, other: StateVector) -> TelepathyResult<()> {
        let total = self.slots.len() + other.slots.len();
        if total > MAX_QUBITS {
            return Err(TelepathyError::ResourceUnavailable(format!(
                "simulator capacity of {} qubits exhausted",
                MAX_QUBITS
            )));
        }

        let low = self.amplitudes.len();
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); low * other.amplitudes.len()];
        for (j, b) in other.amplitudes.iter().enumerate() {
            for (i, a) in self.amplitudes.iter().enumerate() {
                amplitudes[j * low + i] = a * b;
            }
        }

        self.amplitudes = amplitudes;
        self.slots.extend(other.slots);
        Ok(())
    }

    pub fn apply(&mut self, id: QubitId, gate: Gate) -> TelepathyResult<()> {
        let bit = 1usize << self.slot(id)?;
        let m = gate_matrix(gate);

        for i in 0..self.amplitudes.len() {
            if i & bit != 0 {
                continue;
            }
            let j = i | bit;
            let (a0, a1) = (self.amplitudes[i], self.amplitudes[j]);
            self.amplitudes[i] = m[0][0] * a0 + m[0][1] * a1;
            self.amplitudes[j] = m[1][0] * a0 + m[1][1] * a1;
        }
        Ok(())
    }

    pub fn cnot(&mut self, control: QubitId, target: QubitId) -> TelepathyResult<()> {
        let c = 1usize << self.slot(control)?;
        let t = 1usize << self.slot(target)?;
        if c == t {
            return Err(TelepathyError::NonLocalOperation { control, target });
        }

        for i in 0..self.amplitudes.len() {
            if i & c != 0 && i & t == 0 {
                self.amplitudes.swap(i, i | t);
            }
        }
        Ok(())
    }

    /// Probability that measuring `id` yields 1
    pub fn probability_one(&self, id: QubitId) -> TelepathyResult<f64> {
        let bit = 1usize << self.slot(id)?;
        Ok(self
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & bit != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum())
    }

    /// Measure `id` in the Z basis and remove it from the state
    pub fn measure<R: Rng>(&mut self, id: QubitId, rng: &mut R) -> TelepathyResult<bool> {
        let k = self.slot(id)?;
        let p1 = self.probability_one(id)?;

        let outcome = if p1 < CERTAINTY_EPSILON {
            false
        } else if p1 > 1.0 - CERTAINTY_EPSILON {
            true
        } else {
            rng.gen::<f64>() < p1
        };

        let p = if outcome { p1 } else { 1.0 - p1 };
        let scale = 1.0 / p.sqrt();
        let bit = 1usize << k;
        let low_mask = bit - 1;

        let mut next = vec![Complex64::new(0.0, 0.0); self.amplitudes.len() / 2];
        for (i, amp) in self.amplitudes.iter().enumerate() {
            if (i & bit != 0) != outcome {
                continue;
            }
            let compact = ((i >> (k + 1)) << k) | (i & low_mask);
            next[compact] = *amp * scale;
        }

        self.amplitudes = next;
        self.slots.remove(k);
        Ok(outcome)
    }
}

impl Default for StateVector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn q(id: u64) -> QubitId {
        QubitId::new(id)
    }

    fn bell_pair(state: &mut StateVector, a: QubitId, b: QubitId) {
        state.allocate(a).unwrap();
        state.allocate(b).unwrap();
        state.apply(a, Gate::H).unwrap();
        state.cnot(a, b).unwrap();
    }

    #[test]
    fn test_x_flips_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut state = StateVector::new();
        state.allocate(q(1)).unwrap();
        state.apply(q(1), Gate::X).unwrap();
        assert!(state.measure(q(1), &mut rng).unwrap());
        assert!(state.is_empty());
    }

    #[test]
    fn test_self_inverse_gates() {
        let mut rng = StdRng::seed_from_u64(0);
        for gate in [Gate::H, Gate::K, Gate::X] {
            let mut state = StateVector::new();
            state.allocate(q(1)).unwrap();
            state.apply(q(1), gate).unwrap();
            state.apply(q(1), gate).unwrap();
            assert!(!state.measure(q(1), &mut rng).unwrap(), "{} twice", gate.name());
        }
    }

    #[test]
    fn test_hadamard_superposition() {
        let mut state = StateVector::new();
        state.allocate(q(1)).unwrap();
        state.apply(q(1), Gate::H).unwrap();
        let p = state.probability_one(q(1)).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bell_pair_correlated() {
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = StateVector::new();
            bell_pair(&mut state, q(1), q(2));

            let a = state.measure(q(1), &mut rng).unwrap();
            let b = state.measure(q(2), &mut rng).unwrap();
            assert_eq!(a, b);
            assert!((state.norm_sqr() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_measure_compacts_slots() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = StateVector::new();
        state.allocate(q(1)).unwrap();
        state.allocate(q(2)).unwrap();
        state.allocate(q(3)).unwrap();
        state.apply(q(3), Gate::X).unwrap();

        assert!(!state.measure(q(2), &mut rng).unwrap());
        assert_eq!(state.len(), 2);
        assert!(!state.contains(q(2)));
        // q3 moved down a slot but kept its value
        assert!(state.measure(q(3), &mut rng).unwrap());
        assert!(!state.measure(q(1), &mut rng).unwrap());
    }

    #[test]
    fn test_unknown_qubit() {
        let mut state = StateVector::new();
        assert!(matches!(
            state.apply(q(9), Gate::H),
            Err(TelepathyError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn test_capacity_limit() {
        let mut state = StateVector::new();
        for i in 0..MAX_QUBITS as u64 {
            state.allocate(q(i)).unwrap();
        }
        assert!(state.allocate(q(99)).is_err());
    }

    #[test]
    fn test_absorb_keeps_both_states() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut left = StateVector::new();
        left.allocate(q(1)).unwrap();
        left.apply(q(1), Gate::X).unwrap();

        let mut right = StateVector::new();
        bell_pair(&mut right, q(2), q(3));

        left.absorb(right).unwrap();
        assert_eq!(left.len(), 3);
        assert!((left.norm_sqr() - 1.0).abs() < 1e-9);

        // Gates now span the merged qubits
        left.cnot(q(1), q(2)).unwrap();
        let a = left.measure(q(2), &mut rng).unwrap();
        let b = left.measure(q(3), &mut rng).unwrap();
        assert_ne!(a, b);
        assert!(left.measure(q(1), &mut rng).unwrap());
    }

    #[test]
    fn test_absorb_respects_capacity() {
        let mut left = StateVector::new();
        let mut right = StateVector::new();
        for i in 0..(MAX_QUBITS as u64 / 2) {
            left.allocate(q(i)).unwrap();
            right.allocate(q(100 + i)).unwrap();
        }
        right.allocate(q(999)).unwrap();
        assert!(left.absorb(right).is_err());
        assert_eq!(left.len(), MAX_QUBITS / 2);
    }

    fn gate_strategy() -> impl Strategy<Value = Gate> {
        prop_oneof![Just(Gate::H), Just(Gate::K), Just(Gate::X)]
    }

    proptest! {
        #[test]
        fn prop_gates_preserve_norm(
            ops in proptest::collection::vec((0u64..3, gate_strategy(), any::<bool>()), 0..40),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = StateVector::new();
            for i in 0..3 {
                state.allocate(q(i)).unwrap();
            }
            for (target, gate, entangle) in ops {
                state.apply(q(target), gate).unwrap();
                if entangle {
                    state.cnot(q(target), q((target + 1) % 3)).unwrap();
                }
            }
            prop_assert!((state.norm_sqr() - 1.0).abs() < 1e-9);

            state.measure(q(1), &mut rng).unwrap();
            prop_assert_eq!(state.len(), 2);
            prop_assert!((state.norm_sqr() - 1.0).abs() < 1e-9);
        }
    }
}
