//! docimport - incremental archive import

use anyhow::Context;
use clap::Parser;
use docimport::{importer::ImportReport, pipeline, Cli};
use docimport_common::logging::{init_logging, LogConfig, LogLevel};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; a malformed one is not worth aborting for.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("docimport")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn")
        .build();

    let log_guard = match log_config.merge_env().and_then(|c| init_logging(&c)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            process::exit(2);
        },
    };

    match run(cli).await {
        Ok(report) => {
            info!(
                batches = report.batches,
                imported = report.imported,
                missing = report.missing,
                "Import complete"
            );
        },
        Err(e) => {
            error!(error = ?e, "Import failed");
            eprintln!("Error: {:#}", e);
            // process::exit skips destructors; flush the file writer first.
            drop(log_guard);
            process::exit(1);
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<ImportReport> {
    let config = cli.into_config().context("Invalid configuration")?;
    let report = pipeline::run_import(&config)
        .await
        .with_context(|| format!("Import of collection '{}' aborted", config.collection))?;
    Ok(report)
}
