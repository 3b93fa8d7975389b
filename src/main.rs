use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use nba_shot_prob::config::PipelineConfig;
use nba_shot_prob::pipeline::{self, RunOutcome};
use nba_shot_prob::provider::NbaStatsClient;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let mut cfg = PipelineConfig::from_env().context("invalid environment configuration")?;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    cfg.apply_args(&args).context("invalid arguments")?;

    let client = NbaStatsClient::new(&cfg).context("failed to build stats client")?;
    let outcome = pipeline::run(&client, &cfg).context("shot pull failed")?;

    let report = outcome.report();
    println!("Season: {}", report.season);
    println!(
        "Players: {} attempted, {} with shots, {} without, {} failed",
        report.players_attempted,
        report.players_with_shots,
        report.players_without_shots,
        report.failures.len()
    );
    for failure in report.failures.iter().take(8) {
        println!(" - {failure}");
    }

    match outcome {
        RunOutcome::Persisted { summary, .. } => {
            println!("Rows written: {}", summary.rows_written);
            println!("Parquet: {}", summary.parquet_path.display());
            println!(
                "DB: {} (table {}: {} rows total)",
                summary.db_path.display(),
                summary.table_name,
                summary.table_rows
            );
        }
        RunOutcome::NoData { .. } => {
            println!("No shots pulled; nothing written.");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
