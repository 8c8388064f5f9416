use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};

use level6::{Cli, Deduplicator, init_logging, print_results};

fn run(cli: &Cli) -> Result<bool> {
    let config = cli.to_config()?;
    debug!("Command line arguments: {:?}", cli);
    info!("Starting level6 v{}", env!("CARGO_PKG_VERSION"));

    let mut dedup = Deduplicator::new(config);
    let outcome = dedup.execute();
    if let Err(err) = &outcome {
        error!("Completed with errors, last error: {err}");
    }

    let summary = dedup.summary();
    if cli.json {
        let mut report = serde_json::json!({ "summary": summary });
        if dedup.config().test {
            report["filtered"] = serde_json::json!(dedup.filtered());
        }
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize the summary")?;
        println!("{text}");
    } else {
        if dedup.config().test {
            let base = std::path::absolute(&dedup.config().input)
                .unwrap_or_else(|_| dedup.config().input.clone());
            print_results(dedup.duplicates(), &base);
        }
        println!("{summary}");
    }
    Ok(outcome.is_ok())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("Failed to initialize logging: {err}");
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
