//! Replay captured feeds through the full supervisor
//!
//! Usage:
//!   cargo run --example replay -- demos/config.json demos/captures/
//!
//! Each leg reads `captures/<venue>-<symbol>.jsonl`, one canonical message per
//! line. Press Ctrl-C to stop; each unit's report is printed on exit.
//!
//! Optional:
//!   RUST_LOG=lob_mirror=debug  # Show skipped events and task exits

use std::path::PathBuf;
use std::sync::Arc;

use lob_mirror::config::LegConfig;
use lob_mirror::feed::{AdapterFactory, CanonicalJson, FeedAdapter, LineFeed};
use lob_mirror::orchestrator::{Supervisor, UnitOutcome};
use lob_mirror::{Config, Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lob_mirror=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().ok_or("usage: replay <config.json> <captures-dir>")?;
    let captures = PathBuf::from(args.next().ok_or("usage: replay <config.json> <captures-dir>")?);

    let config = Config::from_json_file(&config_path)?;
    println!("=== Replaying {} pair(s) from {} ===\n", config.pairs().len(), captures.display());

    let factory: Arc<dyn AdapterFactory> =
        Arc::new(move |leg: &LegConfig| -> Result<Box<dyn FeedAdapter>, Error> {
            let path = captures.join(format!("{}-{}.jsonl", leg.venue, leg.symbol));
            let file = std::fs::File::open(&path)
                .map_err(|e| Error::feed(format!("{}: {e}", path.display())))?;
            let reader = tokio::io::BufReader::new(tokio::fs::File::from_std(file));
            Ok(Box::new(LineFeed::new(&leg.venue, reader, CanonicalJson)))
        });

    let (supervisor, mut status) = Supervisor::new(config, factory)?;
    let printer = tokio::spawn(async move {
        while let Some(line) = status.recv().await {
            println!("{line}");
        }
    });

    let outcomes = supervisor.run_until_ctrl_c().await?;
    printer.abort();

    println!("\n=== Summary ===");
    for outcome in &outcomes {
        match outcome {
            UnitOutcome::Stopped(report) => println!(
                "{}: {} ticks, {} anomalies, {} task(s) aborted",
                report.instrument,
                report.ticks,
                report.anomalies.total(),
                report.tasks_aborted
            ),
            UnitOutcome::Failed { instrument, error } => println!("{instrument}: failed: {error}"),
            UnitOutcome::Panicked { instrument, message } => {
                println!("{instrument}: panicked: {message}")
            }
            UnitOutcome::Abandoned { instrument } => println!("{instrument}: abandoned"),
        }
    }
    Ok(())
}
