//! Textual run report

use telepathy_core::TelepathyResult;
use telepathy_protocol::RunReport;

pub fn print_report(title: &str, outcome: &TelepathyResult<RunReport>) {
    println!("--- {}:", title);

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            println!("The run was abandoned: {}", e);
            return;
        }
    };

    println!("Run {} ({})", report.run, report.request);
    println!("Pairs: {} and {}", report.pairs[0], report.pairs[1]);
    println!("Alice: {}", report.alice);
    println!("Bob: {}", report.bob);

    if report.checks.agreement {
        println!("They have the same result :D");
    } else {
        println!("Grr...! They have different result :-(");
    }
    if report.checks.row_parity {
        println!("The parity on row is good! :D");
    } else {
        println!("The parity on row is BAD! :-(");
    }
    if report.checks.column_parity {
        println!("The parity on column is good! :D");
    } else {
        println!("The parity on column is BAD! :-(");
    }
}
