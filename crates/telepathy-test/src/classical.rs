//! Classical baseline
//!
//! Without entanglement the best the two players can do is agree in advance
//! on a fixed answer for every row and every column. Such an assignment can
//! never satisfy all nine cells: the row answers hold an even number of ones
//! in total, the column answers an odd number, yet every cell would have to
//! contribute the same bit to both. Exhaustive search confirms the bound.

use telepathy_core::SQUARE_SIZE;

/// Most cells a deterministic classical strategy can win
pub const CLASSICAL_BOUND: usize = 8;

/// Cells in the square
pub const CELL_COUNT: usize = SQUARE_SIZE * SQUARE_SIZE;

/// Pre-agreed answers: Alice's bits per row, Bob's bits per column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassicalStrategy {
    pub rows: [[bool; SQUARE_SIZE]; SQUARE_SIZE],
    pub columns: [[bool; SQUARE_SIZE]; SQUARE_SIZE],
}

impl ClassicalStrategy {
    /// Whether the answers agree on the shared cell and both parities hold
    pub fn wins(&self, row: usize, col: usize) -> bool {
        let alice = self.rows[row];
        let bob = self.columns[col];
        let row_parity = alice.iter().fold(false, |acc, b| acc ^ b);
        let col_parity = bob.iter().fold(false, |acc, b| acc ^ b);
        alice[col] == bob[row] && !row_parity && col_parity
    }

    /// Number of cells this strategy wins
    pub fn score(&self) -> usize {
        (0..SQUARE_SIZE)
            .flat_map(|r| (0..SQUARE_SIZE).map(move |c| (r, c)))
            .filter(|&(r, c)| self.wins(r, c))
            .count()
    }
}

/// The three-bit answers with the given parity
fn answers_with_parity(odd: bool) -> Vec<[bool; SQUARE_SIZE]> {
    (0u8..8)
        .map(|bits| [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0])
        .filter(|a| (a[0] ^ a[1] ^ a[2]) == odd)
        .collect()
}

/// Every assignment of three answers, one per line, from `choices`
fn line_assignments(choices: &[[bool; SQUARE_SIZE]]) -> Vec<[[bool; SQUARE_SIZE]; SQUARE_SIZE]> {
    let mut all = Vec::with_capacity(choices.len().pow(SQUARE_SIZE as u32));
    for &a in choices {
        for &b in choices {
            for &c in choices {
                all.push([a, b, c]);
            }
        }
    }
    all
}

/// Exhaustive search over every parity-respecting strategy.
///
/// Strategies that break a parity lose every cell on that line, so only
/// parity-respecting answers are considered.
pub fn best_classical_strategy() -> (ClassicalStrategy, usize) {
    let row_sets = line_assignments(&answers_with_parity(false));
    let column_sets = line_assignments(&answers_with_parity(true));

    let mut best = ClassicalStrategy {
        rows: row_sets[0],
        columns: column_sets[0],
    };
    let mut best_score = best.score();

    for rows in &row_sets {
        for columns in &column_sets {
            let candidate = ClassicalStrategy {
                rows: *rows,
                columns: *columns,
            };
            let score = candidate.score();
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
    }
    (best, best_score)
}
