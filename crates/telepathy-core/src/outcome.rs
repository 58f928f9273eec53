//! Measurement results

use std::fmt;

use crate::{Axis, LineIndex, SQUARE_SIZE};

/// The three bits measured along one row or column, in table order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeasurementResult {
    pub axis: Axis,
    pub index: LineIndex,
    bits: [bool; SQUARE_SIZE],
}

impl MeasurementResult {
    pub fn new(axis: Axis, index: LineIndex, bits: [bool; SQUARE_SIZE]) -> Self {
        MeasurementResult { axis, index, bits }
    }

    /// Bit at a position along the line
    #[inline]
    pub fn bit(&self, position: LineIndex) -> bool {
        self.bits[position.get()]
    }

    pub fn bits(&self) -> [bool; SQUARE_SIZE] {
        self.bits
    }

    /// XOR of the three bits
    pub fn parity(&self) -> bool {
        self.bits.iter().fold(false, |acc, b| acc ^ b)
    }

    /// Whether the parity matches what the axis requires
    pub fn parity_holds(&self) -> bool {
        self.parity() == self.axis.expected_parity()
    }
}

impl fmt::Display for MeasurementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}]",
            self.bits[0] as u8, self.bits[1] as u8, self.bits[2] as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity() {
        let row = LineIndex::row(0).unwrap();
        let even = MeasurementResult::new(Axis::Row, row, [true, true, false]);
        assert!(!even.parity());
        assert!(even.parity_holds());

        let odd = MeasurementResult::new(Axis::Column, row, [true, false, false]);
        assert!(odd.parity());
        assert!(odd.parity_holds());

        let bad_row = MeasurementResult::new(Axis::Row, row, [true, false, false]);
        assert!(!bad_row.parity_holds());
    }

    #[test]
    fn test_display() {
        let result = MeasurementResult::new(
            Axis::Row,
            LineIndex::row(1).unwrap(),
            [false, true, true],
        );
        assert_eq!(result.to_string(), "[0, 1, 1]");
        assert!(result.bit(LineIndex::row(2).unwrap()));
    }
}
