use std::ops::Range;

use plotters::style::{BLUE, RED, RGBColor};
use thiserror::Error;

use crate::input::TicketDumps;

pub mod render;

pub const WINNING_LABEL: &str = "Winning tickets";
pub const REINIT_LABEL: &str = "Random reinit";
pub const X_LABEL: &str = "Weights %";
pub const Y_LABEL: &str = "Test accuracy";
pub const Y_RANGE: Range<f64> = 0.0..100.0;
/// Fraction of the data span added on each side of the x axis.
pub const X_MARGIN: f64 = 0.05;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("{series} has {actual} values, expected {expected} (prune_iterations)")]
    ShapeMismatch {
        series: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("no usable sans-serif font found on this system")]
    FontUnavailable,
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: &'static str,
    pub color: RGBColor,
    pub points: Vec<(f64, f64)>,
}

/// Backend-independent description of one winning-ticket vs. reinit chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonFigure {
    pub title: String,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub x_ticks: Vec<Tick>,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub series: Vec<Series>,
    pub grid: bool,
}

impl ComparisonFigure {
    pub fn build(
        arch: &str,
        dataset: &str,
        dumps: &TicketDumps,
        prune_iterations: usize,
    ) -> Result<Self, PlotError> {
        check_len("compression levels", &dumps.compression, prune_iterations)?;
        check_len("winning-ticket accuracy", &dumps.winning_accuracy, prune_iterations)?;
        check_len("reinit accuracy", &dumps.reinit_accuracy, prune_iterations)?;

        let x_ticks = dumps
            .compression
            .iter()
            .enumerate()
            .map(|(i, &level)| Tick {
                position: i as f64,
                label: format_tick(level),
            })
            .collect();

        Ok(Self {
            title: title(arch, dataset),
            x_label: X_LABEL,
            y_label: Y_LABEL,
            x_ticks,
            x_range: padded_index_range(prune_iterations),
            y_range: Y_RANGE,
            series: vec![
                Series {
                    label: WINNING_LABEL,
                    color: BLUE,
                    points: indexed(&dumps.winning_accuracy),
                },
                Series {
                    label: REINIT_LABEL,
                    color: RED,
                    points: indexed(&dumps.reinit_accuracy),
                },
            ],
            grid: true,
        })
    }

    /// Tick text for an x coordinate, empty when it is not a tick position.
    pub fn tick_label_at(&self, x: f64) -> String {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        self.x_ticks
            .get(idx as usize)
            .map(|t| t.label.clone())
            .unwrap_or_default()
    }

    pub fn tick_positions(&self) -> Vec<f64> {
        self.x_ticks.iter().map(|t| t.position).collect()
    }
}

pub fn title(arch: &str, dataset: &str) -> String {
    format!("Test Accuracy vs Weights % ({arch} | {dataset})")
}

/// Formats a value the way Python's `str(float)` does: positional between
/// 1e-4 and 1e16, scientific with a two-digit signed exponent outside it.
pub fn format_tick(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..16).contains(&exponent) {
        let plain = format!("{value}");
        if plain.contains('.') { plain } else { format!("{plain}.0") }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

fn padded_index_range(n: usize) -> Range<f64> {
    let last = n.saturating_sub(1) as f64;
    let pad = if last > 0.0 { last * X_MARGIN } else { 0.5 };
    -pad..last + pad
}

fn indexed(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect()
}

fn check_len(series: &'static str, values: &[f64], expected: usize) -> Result<(), PlotError> {
    if values.len() != expected {
        return Err(PlotError::ShapeMismatch {
            series,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/plot/tests.rs"]
mod tests;
