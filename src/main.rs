//! CLI entry point for the ctanmirror tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ctanmirror_core::render::RenderResult;
use ctanmirror_core::{FileConfig, HttpClient, Orchestrator, RunReport};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let quiet = args.quiet;
    let file_config = match &args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => FileConfig::load_default()?,
    };
    let config = args
        .into_run_config(file_config.as_ref())
        .context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;

    let client = HttpClient::new_with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)
        .context("Failed to create HTTP client")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    info!("ctanmirror starting");
    let orchestrator = Orchestrator::new(config, Arc::new(client));
    let cancel = orchestrator.cancel_flag();
    let report = runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current download");
                cancel.cancel();
            }
        });
        orchestrator.run().await
    })?;

    if !quiet {
        print_summary(&report);
    }
    Ok(ExitCode::from(exit_status(&report)))
}

fn print_summary(report: &RunReport) {
    let stats = report.stats;
    println!(
        "{} packages in catalog, {} selected",
        stats.store_records, stats.selected_count
    );
    if report.empty_selection {
        println!("No package matched the given patterns; nothing rendered.");
    }
    if stats.enriched > 0 {
        println!("Fetched metadata of {} packages to apply filters", stats.enriched);
    }
    if stats.fetched + stats.cached + stats.failed > 0 {
        println!(
            "Downloads: {} fetched, {} cached, {} failed, {} skipped (limit), {} retried",
            stats.fetched, stats.cached, stats.failed, stats.skipped_limit, stats.retried
        );
    }
    for failure in &report.failures {
        println!(
            "  failed: {} {} ({} attempts): {}",
            failure.record_id,
            failure.url,
            failure.attempts,
            failure.error
        );
    }
    for (id, error) in &report.parse_failures {
        println!("  unparseable: {id}: {error}");
    }
    if let Some(error) = &report.index_error {
        println!("Remote index unavailable, used existing catalog: {error}");
    }
    if report.cancelled {
        println!("Cancelled; output not rendered.");
    }
    if let Some(RenderResult::Rendered(output)) = &report.render {
        println!(
            "Wrote {} ({} packages)",
            output.primary_path.display(),
            output.rendered
        );
    }
}

/// 0 on complete success or empty selection, 2 when something failed.
fn exit_status(report: &RunReport) -> u8 {
    if report.is_complete_success() { 0 } else { 2 }
}
