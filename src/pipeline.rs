use std::fs;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::input::{InputError, TicketDumps, load_dumps};
use crate::plot::render::{RenderOptions, render_png};
use crate::plot::{ComparisonFigure, PlotError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("{arch}/{dataset}: {source}")]
    Plot {
        arch: String,
        dataset: String,
        #[source]
        source: PlotError,
    },
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSummary {
    pub label: String,
    pub final_accuracy: f64,
    pub best_accuracy: f64,
    pub best_at_compression: f64,
}

/// Record of one rendered (arch, dataset) plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotOutcome {
    pub arch: String,
    pub dataset: String,
    pub output: PathBuf,
    pub points: usize,
    pub curves: Vec<CurveSummary>,
}

/// Progress bar over the configured pairs; hidden when `visible` is false.
pub fn batch_progress(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        bar.set_style(style);
    }
    bar
}

/// Plots every configured pair in order, stopping at the first failure.
/// Images written for earlier pairs stay on disk.
pub fn run_batch(
    config: &PlotConfig,
    progress: &ProgressBar,
) -> Result<Vec<PlotOutcome>, PipelineError> {
    let total = config.pair_count();
    let mut outcomes = Vec::with_capacity(total);
    for (idx, (arch, dataset)) in config.pairs().enumerate() {
        progress.set_message(format!("{arch} | {dataset}"));
        tracing::info!("[{}/{}] plotting {} | {}", idx + 1, total, arch, dataset);
        let outcome = plot_pair(config, arch, dataset);
        progress.inc(1);
        match outcome {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        }
    }
    progress.finish_with_message("done");
    Ok(outcomes)
}

pub fn plot_pair(
    config: &PlotConfig,
    arch: &str,
    dataset: &str,
) -> Result<PlotOutcome, PipelineError> {
    let plot_err = |source| PipelineError::Plot {
        arch: arch.to_string(),
        dataset: dataset.to_string(),
        source,
    };

    let dumps = load_dumps(&config.dump_dir(arch, dataset))?;
    let figure = ComparisonFigure::build(arch, dataset, &dumps, config.prune_iterations)
        .map_err(plot_err)?;

    let out_dir = config.output_dir();
    fs::create_dir_all(&out_dir).map_err(|source| PipelineError::OutputDir {
        path: out_dir.clone(),
        source,
    })?;

    let output = config.output_path(arch, dataset);
    let (width_px, height_px) = config.pixel_size();
    let opts = RenderOptions {
        width_px,
        height_px,
        dpi: config.dpi,
    };
    render_png(&figure, &output, &opts).map_err(plot_err)?;
    tracing::info!("saved {}", output.display());

    Ok(PlotOutcome {
        arch: arch.to_string(),
        dataset: dataset.to_string(),
        output,
        points: figure.x_ticks.len(),
        curves: summarize_curves(&figure, &dumps),
    })
}

fn summarize_curves(figure: &ComparisonFigure, dumps: &TicketDumps) -> Vec<CurveSummary> {
    figure
        .series
        .iter()
        .map(|series| {
            let (best_idx, best) = series
                .points
                .iter()
                .map(|&(_, y)| y)
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |acc, (i, y)| {
                    if y > acc.1 { (i, y) } else { acc }
                });
            CurveSummary {
                label: series.label.to_string(),
                final_accuracy: series.points.last().map(|p| p.1).unwrap_or(f64::NAN),
                best_accuracy: best,
                best_at_compression: dumps.compression.get(best_idx).copied().unwrap_or(f64::NAN),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/src_inline/pipeline.rs"]
mod tests;
