//! netbundle - converts trained MetaSense network artifacts into one JSON
//! parameter bundle.
//!
//! Runs once: loads every configured artifact, extracts the requested
//! components, writes the document and exits. Exit status is non-zero on any
//! failure, in which case no new document was written.

use anyhow::{Context, Result};
use clap::Parser;
use netbundle_core::{export, ExportConfig, JsonArtifactLoader, NetBundleError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netbundle")]
#[command(about = "Export trained network parameters to a single JSON document")]
struct Args {
    /// Export configuration (JSON). Uses the built-in board-18 setup if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the output document path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    if let Some(output) = args.output {
        config.output_path = output;
    }

    info!(
        "Exporting {} source(s) to {}",
        config.sources.len(),
        config.output_path.display()
    );
    let report = export(&config, &JsonArtifactLoader)?;

    for component in &report.components {
        info!(
            "  {}: {} layers, {} weight/bias pairs",
            component.suffix, component.layers, component.parameterized_layers
        );
    }
    if report.dropped_count() > 0 {
        warn!("Dropped {} unclassified parameter(s)", report.dropped_count());
    }

    // Confirmation on stdout
    println!("Saved as {}", report.output_path.display());
    Ok(())
}

/// Status for a failed run, taken from the library error when there is one.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<NetBundleError>())
        .map_or(1, NetBundleError::exit_code)
}
