//! The 3×3 magic-square measurement table
//!
//! ```text
//! [+XI] [+XX] [+IX]      row parity 0
//! [-XZ] [+YY] [-ZX]      row parity 0
//! [+IZ] [+ZZ] [+ZI]      row parity 0
//!
//! column parity  1      1      1
//! ```
//!
//! The table is immutable configuration. Components receive it by value or
//! behind an `Arc`; nothing mutates it after construction.

use std::fmt;

use crate::{MeasurementSpec, Observable, Pauli, TelepathyError, TelepathyResult};

/// Number of rows and columns
pub const SQUARE_SIZE: usize = 3;

/// Line direction within the table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

impl Axis {
    /// Required XOR of the three outcomes along a line of this axis
    pub fn expected_parity(self) -> bool {
        match self {
            Axis::Row => false,
            Axis::Column => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Row => "row",
            Axis::Column => "column",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated row or column selector in `0..=2`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineIndex(u8);

impl LineIndex {
    pub const ALL: [LineIndex; SQUARE_SIZE] = [LineIndex(0), LineIndex(1), LineIndex(2)];

    /// Validate a raw selector for the given axis
    pub fn new(axis: Axis, index: i64) -> TelepathyResult<Self> {
        if (0..SQUARE_SIZE as i64).contains(&index) {
            Ok(LineIndex(index as u8))
        } else {
            Err(TelepathyError::IndexError { axis, index })
        }
    }

    /// Validate a `usize` selector, such as a position in a collection
    pub fn from_usize(axis: Axis, index: usize) -> TelepathyResult<Self> {
        match i64::try_from(index) {
            Ok(index) => Self::new(axis, index),
            Err(_) => Err(TelepathyError::IndexError {
                axis,
                index: i64::MAX,
            }),
        }
    }

    pub fn row(index: i64) -> TelepathyResult<Self> {
        Self::new(Axis::Row, index)
    }

    pub fn column(index: i64) -> TelepathyResult<Self> {
        Self::new(Axis::Column, index)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<(Axis, usize)> for LineIndex {
    type Error = TelepathyError;

    fn try_from((axis, index): (Axis, usize)) -> TelepathyResult<Self> {
        Self::from_usize(axis, index)
    }
}

impl fmt::Display for LineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 3×3 grid of joint-measurement specifications, indexed `[row][col]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeasurementTable {
    cells: [[MeasurementSpec; SQUARE_SIZE]; SQUARE_SIZE],
}

/// The Mermin-Peres magic square used by the protocol
pub const MAGIC_SQUARE: MeasurementTable = {
    use Pauli::*;
    MeasurementTable {
        cells: [
            [
                MeasurementSpec::plus(X, I),
                MeasurementSpec::plus(X, X),
                MeasurementSpec::plus(I, X),
            ],
            [
                MeasurementSpec::minus(X, Z),
                MeasurementSpec::plus(Y, Y),
                MeasurementSpec::minus(Z, X),
            ],
            [
                MeasurementSpec::plus(I, Z),
                MeasurementSpec::plus(Z, Z),
                MeasurementSpec::plus(Z, I),
            ],
        ],
    }
};

impl MeasurementTable {
    pub const fn new(cells: [[MeasurementSpec; SQUARE_SIZE]; SQUARE_SIZE]) -> Self {
        MeasurementTable { cells }
    }

    /// Build a table from text specs, e.g. `[["+XI", "+XX", "+IX"], ...]`
    pub fn from_strs(rows: [[&str; SQUARE_SIZE]; SQUARE_SIZE]) -> TelepathyResult<Self> {
        let mut cells = MAGIC_SQUARE.cells;
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                cells[r][c] = MeasurementSpec::parse(text)?;
            }
        }
        Ok(MeasurementTable { cells })
    }

    /// The row's specs, left to right
    pub fn specs_for_row(&self, row: LineIndex) -> [MeasurementSpec; SQUARE_SIZE] {
        self.cells[row.get()]
    }

    /// The column's specs, top to bottom
    pub fn specs_for_column(&self, col: LineIndex) -> [MeasurementSpec; SQUARE_SIZE] {
        let c = col.get();
        [self.cells[0][c], self.cells[1][c], self.cells[2][c]]
    }

    pub fn specs_for(&self, axis: Axis, index: LineIndex) -> [MeasurementSpec; SQUARE_SIZE] {
        match axis {
            Axis::Row => self.specs_for_row(index),
            Axis::Column => self.specs_for_column(index),
        }
    }

    pub fn spec_at(&self, row: LineIndex, col: LineIndex) -> MeasurementSpec {
        self.cells[row.get()][col.get()]
    }

    /// Check the magic-square invariant.
    ///
    /// Every line must consist of pairwise commuting observables whose
    /// product is `+I` for rows and `-I` for columns.
    pub fn validate(&self) -> TelepathyResult<()> {
        for axis in [Axis::Row, Axis::Column] {
            for index in LineIndex::ALL {
                let specs = self.specs_for(axis, index);

                for i in 0..SQUARE_SIZE {
                    for j in (i + 1)..SQUARE_SIZE {
                        if !specs[i].commutes_with(&specs[j]) {
                            return Err(TelepathyError::InconsistentTable(format!(
                                "{} {}: {} and {} do not commute",
                                axis, index, specs[i], specs[j]
                            )));
                        }
                    }
                }

                let product = specs
                    .iter()
                    .map(MeasurementSpec::observable)
                    .fold(Observable::IDENTITY, Observable::mul);
                if product.identity_parity() != Some(axis.expected_parity()) {
                    return Err(TelepathyError::InconsistentTable(format!(
                        "{} {}: product {:?} does not give parity {}",
                        axis,
                        index,
                        product,
                        axis.expected_parity() as u8
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for MeasurementTable {
    fn default() -> Self {
        MAGIC_SQUARE
    }
}

impl fmt::Display for MeasurementTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            writeln!(f, "[{}] [{}] [{}]", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}
