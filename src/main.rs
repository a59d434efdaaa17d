mod config;
mod input;
mod logging;
mod pipeline;
mod plot;
mod report;

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::{ConfigError, PlotConfig};
use crate::logging::Verbosity;
use crate::pipeline::{PipelineError, batch_progress, run_batch};
use crate::report::{BatchSummary, render_outcome_line, write_summary_json};

/// Render winning-ticket vs. random-reinit accuracy plots from lottery-ticket dumps.
#[derive(Parser, Debug)]
#[command(name = "lt-plots", version, about, long_about = None)]
struct Cli {
    /// JSON config file; CLI flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory holding dumps/ and plots/ (default: current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output resolution in dots per inch
    #[arg(long)]
    dpi: Option<u32>,

    /// Expected number of pruning iterations per curve
    #[arg(long = "prune-iterations")]
    prune_iterations: Option<usize>,

    /// Architectures to plot (comma separated or repeated)
    #[arg(long = "arch", value_delimiter = ',')]
    arch_types: Vec<String>,

    /// Datasets to plot (comma separated or repeated)
    #[arg(long = "dataset", value_delimiter = ',')]
    datasets: Vec<String>,

    /// Write a JSON summary of the rendered plots here
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("cannot write summary {}: {source}", .path.display())]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));
    if let Err(err) = run(&cli) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = resolve_config(cli)?;
    tracing::info!(
        "plotting {} pair(s) at {} dpi ({}x{} px)",
        config.pair_count(),
        config.dpi,
        config.pixel_size().0,
        config.pixel_size().1
    );

    let progress = batch_progress(
        config.pair_count(),
        Verbosity::from_flags(cli.verbose, cli.quiet) != Verbosity::Quiet,
    );
    let outcomes = run_batch(&config, &progress)?;
    for outcome in &outcomes {
        tracing::info!("{}", render_outcome_line(outcome));
    }

    if let Some(path) = &cli.summary {
        let summary = BatchSummary::new(&config, &outcomes);
        write_summary_json(&summary, path).map_err(|source| AppError::Summary {
            path: path.clone(),
            source,
        })?;
        tracing::info!("summary written to {}", path.display());
    }
    Ok(())
}

/// Defaults, then the config file, then CLI flags; validated once at the end.
fn resolve_config(cli: &Cli) -> Result<PlotConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => PlotConfig::from_json_file(path)?,
        None => PlotConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(dpi) = cli.dpi {
        config.dpi = dpi;
    }
    if let Some(n) = cli.prune_iterations {
        config.prune_iterations = n;
    }
    if !cli.arch_types.is_empty() {
        config.arch_types = cli.arch_types.clone();
    }
    if !cli.datasets.is_empty() {
        config.datasets = cli.datasets.clone();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
