//! Command-line driver for the GPUdb table monitor source
//!
//! Streams every row inserted into a GPUdb table to stdout, one JSON object
//! per line, until Ctrl-C or until `--max-records` records were printed.
//!
//! ```bash
//! gpudb-monitor-bridge \
//!   --gpudb-url http://localhost:9191 \
//!   --table-name users \
//!   --topic users-inserts
//! ```
//!
//! Log output goes to stderr and is controlled through `RUST_LOG`.

use anyhow::Context;
use clap::Parser;
use gpudb_monitor_source::{MonitorSourceConfig, SourceTask};
use std::io::Write;
use tracing::info;

#[derive(Parser)]
#[command(name = "gpudb-monitor-bridge")]
#[command(about = "Stream rows inserted into a GPUdb table as JSON lines")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    source: MonitorSourceConfig,

    /// Stop after printing this many records
    #[arg(long)]
    max_records: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let table_name = cli.source.table_name.clone();

    let task = SourceTask::start_with_config(cli.source)
        .await
        .with_context(|| format!("Failed to start table monitor source for {table_name}"))?;

    let streamed = stream(&task, cli.max_records).await;
    task.stop().await;

    let printed = streamed.context("Failed to write records")?;
    info!("Printed {printed} records from {table_name}");
    Ok(())
}

/// Print polled records until interrupted or `limit` is reached.
async fn stream(task: &SourceTask, limit: Option<u64>) -> std::io::Result<u64> {
    let mut printed = 0u64;
    let mut stdout = std::io::stdout();

    loop {
        let batch = tokio::select! {
            batch = task.poll() => batch,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping");
                return Ok(printed);
            }
        };
        if batch.is_empty() {
            return Ok(printed);
        }

        for record in batch {
            writeln!(stdout, "{}", record.to_json())?;
            printed += 1;
            if limit.is_some_and(|limit| printed >= limit) {
                stdout.flush()?;
                return Ok(printed);
            }
        }
        stdout.flush()?;
    }
}
