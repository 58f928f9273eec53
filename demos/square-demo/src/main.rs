//! Telepathy Demo Application
//!
//! Plays the magic-square game on the simulated network:
//! - A single run for the chosen row and column
//! - Optionally a paired run, two games in flight at once
//!
//! Settings come from `TELEPATHY_*` environment variables or a JSON file,
//! with command-line flags taking precedence.

mod report;

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use telepathy_core::MeasurementTable;
use telepathy_runtime::{init_logging, ConcurrentRunner, LogFormat, RuntimeConfig};
use telepathy_sim::{SimConfig, SimulatedNetwork};

use report::print_report;

#[derive(Parser)]
#[command(name = "square-demo")]
#[command(about = "Magic-square pseudo-telepathy on a simulated entanglement network", long_about = None)]
struct Cli {
    /// Row Alice measures [0, 1, 2]
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    row: i64,

    /// Column Bob measures [0, 1, 2]
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    col: i64,

    /// Row for the second game of a paired run
    #[arg(long, requires = "col2", allow_negative_numbers = true)]
    row2: Option<i64>,

    /// Column for the second game of a paired run
    #[arg(long, requires = "row2", allow_negative_numbers = true)]
    col2: Option<i64>,

    /// Seed for the simulated measurement outcomes
    #[arg(short, long, default_value_t = 0x5eed)]
    seed: u64,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Measure Alice and Bob one after the other
    #[arg(long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_json(&fs::read_to_string(path)?)?,
        None => RuntimeConfig::from_env()?,
    };
    if cli.json {
        config.log.format = LogFormat::Json;
    }
    if cli.sequential {
        config.concurrent_sides = false;
    }
    init_logging(&config.log);

    let table = MeasurementTable::default();
    table.validate()?;

    println!("Magic-square pseudo-telepathy");
    println!("{}", table);
    println!();

    let network = SimulatedNetwork::new(SimConfig::with_seed(cli.seed));
    let executor = ConcurrentRunner::new(network.clone(), &config);
    tracing::info!(seed = cli.seed, concurrent_sides = config.concurrent_sides, "demo starting");

    println!("=== Let's try a single exec");
    let single = executor.run_single(cli.row, cli.col).await;
    if let Err(e) = &single {
        if e.is_contract_violation() {
            return Err(e.clone().into());
        }
    }
    print_report("Single run", &single);

    if let (Some(row2), Some(col2)) = (cli.row2, cli.col2) {
        println!();
        println!("=== Let's try a paired exec");
        let (first, second) = executor
            .run_paired((cli.row, cli.col), (row2, col2))
            .await?;
        print_report("First run", &first);
        print_report("Second run", &second);
    }

    let stats = executor.stats();
    tracing::info!(
        completed = stats.runs_completed,
        failed = stats.runs_failed,
        timed_out = stats.runs_timed_out,
        live_qubits = network.live_qubits(),
        "demo finished"
    );
    Ok(())
}
