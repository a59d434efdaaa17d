use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::PlotConfig;
use crate::pipeline::PlotOutcome;

#[derive(Debug, Serialize)]
pub struct BatchSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub dpi: u32,
    pub prune_iterations: usize,
    pub plots: &'a [PlotOutcome],
}

impl<'a> BatchSummary<'a> {
    pub fn new(config: &PlotConfig, plots: &'a [PlotOutcome]) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            dpi: config.dpi,
            prune_iterations: config.prune_iterations,
            plots,
        }
    }
}

pub fn write_summary_json(summary: &BatchSummary<'_>, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, summary)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    w.write_all(b"\n")?;
    w.flush()
}

pub fn render_outcome_line(outcome: &PlotOutcome) -> String {
    let mut line = format!(
        "{} | {}: {} points",
        outcome.arch, outcome.dataset, outcome.points
    );
    for curve in &outcome.curves {
        line.push_str(&format!(
            "; {} final={:.2} best={:.2}@{}%",
            curve.label,
            curve.final_accuracy,
            curve.best_accuracy,
            crate::plot::format_tick(curve.best_at_compression)
        ));
    }
    line
}

#[cfg(test)]
#[path = "../tests/src_inline/report.rs"]
mod tests;
