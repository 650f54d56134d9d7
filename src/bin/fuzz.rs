//! Fuzz harness front end.
//!
//! Runs random causal scenarios against a sequence implementation and checks
//! every merged document against the partial effect relation. Prints a seed
//! for each failing scenario; pass it back with `--seed` to replay.
//!
//! ```text
//! fuzz --iterations 1000 --implementation rga-ot
//! fuzz --seed '{"seed":[...],"word_pos":0}' --iterations 1
//! ```

use std::process::ExitCode;

use clap::Parser;
use interleave::fuzz::{FuzzConfig, Implementation, run_configured};
use tracing_subscriber::EnvFilter;

/// Model-based fuzzing for replicated sequence merges.
#[derive(Parser, Debug)]
#[command(name = "fuzz")]
#[command(version)]
struct Cli {
    /// Number of scenarios to run
    #[arg(short = 'n', long, env = "INTERLEAVE_ITERATIONS", default_value_t = 10_000)]
    iterations: usize,

    /// Operation slots per scenario
    #[arg(long, default_value_t = 20)]
    slots: usize,

    /// Elements per random insertion
    #[arg(long, default_value_t = 3)]
    insert_len: usize,

    /// Chance that an edit on a non-empty document is a deletion
    #[arg(long, default_value_t = 0.3)]
    delete_probability: f64,

    /// Seed string printed by a failed run
    #[arg(long)]
    seed: Option<String>,

    /// Implementation under test
    #[arg(long, value_enum, default_value_t = Implementation::Rga)]
    implementation: Implementation,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl From<&Cli> for FuzzConfig {
    fn from(cli: &Cli) -> FuzzConfig {
        return FuzzConfig {
            iterations: cli.iterations,
            slots: cli.slots,
            insert_len: cli.insert_len,
            delete_probability: cli.delete_probability,
            seed: cli.seed.clone(),
            implementation: cli.implementation,
        };
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = FuzzConfig::from(&cli);

    let report = match run_configured(&config) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(2);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(error) => eprintln!("error: {error}"),
        }
    } else {
        for failure in &report.failures {
            println!("run {} failed: {}", failure.run, failure.reason);
            println!("==seed===========================");
            println!("{}", failure.seed);
            println!("=================================");
        }
        println!("{} test runs completed.", report.runs);
        if report.is_success() {
            println!("all runs successful");
        } else {
            println!("some runs failed, see details above");
        }
    }

    if report.is_success() {
        return ExitCode::SUCCESS;
    }
    return ExitCode::FAILURE;
}
