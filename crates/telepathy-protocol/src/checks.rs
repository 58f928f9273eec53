//! Per-run consistency checks

use std::fmt;

use telepathy_core::MeasurementResult;

/// Outcome of the three checks made after every run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckReport {
    /// Alice's bit at the chosen column equals Bob's bit at the chosen row
    pub agreement: bool,
    /// Alice's row XORs to 0
    pub row_parity: bool,
    /// Bob's column XORs to 1
    pub column_parity: bool,
}

impl CheckReport {
    /// Compare Alice's row result against Bob's column result
    pub fn evaluate(alice: &MeasurementResult, bob: &MeasurementResult) -> Self {
        CheckReport {
            agreement: alice.bit(bob.index) == bob.bit(alice.index),
            row_parity: !alice.parity(),
            column_parity: bob.parity(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.agreement && self.row_parity && self.column_parity
    }

    /// Names of the checks that failed
    pub fn failures(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.agreement {
            failed.push("agreement");
        }
        if !self.row_parity {
            failed.push("row parity");
        }
        if !self.column_parity {
            failed.push("column parity");
        }
        failed
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed {
        "good"
    } else {
        "BAD"
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "agreement {}, row parity {}, column parity {}",
            verdict(self.agreement),
            verdict(self.row_parity),
            verdict(self.column_parity)
        )
    }
}
