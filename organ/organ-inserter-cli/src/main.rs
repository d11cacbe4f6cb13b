//! Organ insertion from the command line.
//!
//! Registers each organ mesh into the scaffold's marker frame, tags it with
//! its organ group and prints the produced paths, one per line.
//!
//! ```text
//! organ-inserter --scaffold whole_body.exf --output out colon.exf heart_data.exf
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use organ_inserter::{
    InserterConfig, LandmarkRegistrar, MarkerPolicy, OrganInserter, TracingBusyIndicator,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Insert organ meshes into a scaffold
#[derive(Parser)]
#[command(name = "organ-inserter")]
#[command(about = "Register organ meshes to scaffold markers and tag them by organ", long_about = None)]
#[command(version)]
struct Cli {
    /// Scaffold mesh carrying the markers
    #[arg(long)]
    scaffold: PathBuf,

    /// Directory receiving the marker set, organ meshes and manifest
    #[arg(long)]
    output: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "organ_inserter=debug")
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Scaffold coordinate field, overriding discovery
    #[arg(long)]
    coordinates: Option<String>,

    /// What to do with markers that cannot be evaluated (skip or fail)
    #[arg(long)]
    marker_policy: Option<MarkerPolicy>,

    /// Organ meshes, processed in order
    #[arg(name = "ORGAN", required = true)]
    organs: Vec<PathBuf>,
}

fn run(cli: Cli) -> Result<()> {
    debug!(scaffold = %cli.scaffold.display(), organs = cli.organs.len(), "Parsed arguments");
    let mut config = match &cli.config {
        Some(path) => InserterConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => InserterConfig::default(),
    };
    if let Some(field) = cli.coordinates {
        config = config.with_coordinate_field(field);
    }
    if let Some(policy) = cli.marker_policy {
        config = config.with_marker_policy(policy);
    }

    let report = OrganInserter::new(config)
        .run(
            &cli.scaffold,
            &cli.organs,
            &cli.output,
            &mut LandmarkRegistrar::new(),
            &TracingBusyIndicator,
        )
        .with_context(|| format!("inserting organs into {}", cli.scaffold.display()))?;

    for path in report.output_files() {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
