//! Wardmodem scenario replay binary.
//!
//! # Usage
//!
//! ```bash
//! # Replay a scenario with its own seed
//! wardmodem-replay crates/wardmodem-harness/scenarios/late_modem.toml
//!
//! # Verification failures are logged at warn as they are reported
//! wardmodem-replay late_modem.toml --log-level warn
//!
//! # Same scenario, different jitter, full transceiver logs
//! wardmodem-replay late_modem.toml --seed 42 --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wardmodem_core::Mode;
use wardmodem_harness::{Scenario, ScenarioReport};

/// Wardmodem scenario replay
#[derive(Parser, Debug)]
#[command(name = "wardmodem-replay")]
#[command(about = "Replay AT sessions against the wardmodem transceiver")]
#[command(version)]
struct Args {
    /// Scenario files (TOML)
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,

    /// Override the seed of every scenario
    #[arg(long)]
    seed: Option<u64>,

    /// Override the initial mode (ward-model, pass-through, split-verify)
    #[arg(long)]
    mode: Option<Mode>,

    /// Override the modem response window, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn summarize(report: &ScenarioReport) {
    tracing::info!(
        scenario = %report.name,
        seed = report.seed,
        mode = %report.final_mode,
        elapsed_ms = report.elapsed.as_millis(),
        delivered = report.delivered.len(),
        matched = report.stats.matched,
        mismatched = report.stats.mismatched,
        timed_out = report.stats.timed_out,
        dropped = report.stats.dropped_lines,
        late = report.stats.late_modem_lines,
        "scenario replayed"
    );
    for violation in &report.violations {
        tracing::error!(scenario = %report.name, "{violation}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut failed = 0usize;
    for path in &args.scenarios {
        let mut scenario = Scenario::load(path)?;
        if let Some(seed) = args.seed {
            scenario = scenario.with_seed(seed);
        }
        if let Some(mode) = args.mode {
            scenario = scenario.with_mode(mode);
        }
        if let Some(timeout_ms) = args.timeout_ms {
            scenario = scenario.with_timeout_ms(timeout_ms);
        }

        tracing::info!("Replaying {}", path.display());
        let report = scenario.run();
        summarize(&report);
        if !report.passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} scenarios failed", args.scenarios.len()).into());
    }

    tracing::info!("All {} scenarios passed", args.scenarios.len());
    Ok(())
}
