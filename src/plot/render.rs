use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::coord::ranged1d::{BoldPoints, DefaultFormatting, KeyPointHint};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::FontDesc;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::plot::{ComparisonFigure, PlotError};

const FONT: &str = "sans-serif";
const GRID_GRAY: RGBColor = RGBColor(128, 128, 128);

/// Pixel geometry of the output image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
}

impl RenderOptions {
    /// Converts a length in typographic points to pixels at this DPI.
    pub fn px(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72.0).round().max(1.0) as u32
    }

    /// Same as [`Self::px`], for plotters' signed size parameters.
    pub fn size(&self, points: f64) -> i32 {
        self.px(points).min(i32::MAX as u32) as i32
    }

    fn font_px(&self, points: f64) -> f64 {
        self.px(points) as f64
    }
}

/// X axis with one key point per pruning iteration, mapped linearly over
/// the padded index range.
#[derive(Clone)]
pub struct TickAxis {
    positions: Vec<f64>,
    linear: RangedCoordf64,
}

impl TickAxis {
    pub fn new(figure: &ComparisonFigure) -> Self {
        Self {
            positions: figure.tick_positions(),
            linear: figure.x_range.clone().into(),
        }
    }
}

impl Ranged for TickAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.linear.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        let max = hint.max_num_points();
        if max == 0 {
            return Vec::new();
        }
        let stride = self.positions.len().div_ceil(max).max(1);
        self.positions.iter().copied().step_by(stride).collect()
    }

    fn range(&self) -> Range<f64> {
        self.linear.range()
    }
}

/// Output file that only appears at its final path once committed.
struct PendingImage {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PendingImage {
    fn new(target: &Path) -> Self {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plot.png".to_string());
        Self {
            staging: target.with_file_name(format!(".partial-{name}")),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn commit(mut self) -> Result<(), PlotError> {
        fs::rename(&self.staging, &self.target).map_err(|source| PlotError::Write {
            path: self.target.clone(),
            source,
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingImage {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staging);
        }
    }
}

/// font-kit panics instead of erroring on hosts without any font directory,
/// so the probe runs under `catch_unwind`.
pub fn font_available() -> bool {
    std::panic::catch_unwind(|| {
        FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal)
            .box_size("0")
            .is_ok()
    })
    .unwrap_or(false)
}

fn render_err(e: impl std::fmt::Display) -> PlotError {
    PlotError::Render(e.to_string())
}

/// Renders `figure` as a PNG at `path`. The drawing surface is released
/// before this returns, on success and on error alike.
pub fn render_png(
    figure: &ComparisonFigure,
    path: &Path,
    opts: &RenderOptions,
) -> Result<(), PlotError> {
    if !font_available() {
        return Err(PlotError::FontUnavailable);
    }
    let pending = PendingImage::new(path);
    draw_png(figure, &pending.staging, opts)?;
    pending.commit()
}

fn draw_png(figure: &ComparisonFigure, path: &Path, opts: &RenderOptions) -> Result<(), PlotError> {
    let root = BitMapBackend::new(path, (opts.width_px, opts.height_px)).into_drawing_area();
    draw_chart(&root, figure, opts)?;
    root.present().map_err(render_err)?;
    tracing::debug!(
        "rendered {}x{} px to {}",
        opts.width_px,
        opts.height_px,
        path.display()
    );
    Ok(())
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    figure: &ComparisonFigure,
    opts: &RenderOptions,
) -> Result<(), PlotError> {
    root.fill(&WHITE).map_err(render_err)?;

    let label_px = opts.font_px(10.0);
    let tick_style = TextStyle::from((FONT, label_px).into_font())
        .transform(FontTransform::Rotate270)
        .pos(Pos::new(HPos::Right, VPos::Center));
    let tick_gap = opts.size(3.5);

    let mut longest_tick = 0;
    for tick in &figure.x_ticks {
        let (w, _) = root
            .estimate_text_size(&tick.label, &tick_style)
            .map_err(render_err)?;
        longest_tick = longest_tick.max(w as i32);
    }
    // rotated tick text hangs below the axis, the axis title sits under it
    let x_area = tick_gap + longest_tick + (label_px * 1.8).ceil() as i32;
    let y_area = (label_px * 4.2).ceil() as i32;

    let axis = TickAxis::new(figure);
    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, (FONT, opts.font_px(12.0)))
        .margin(opts.size(7.2))
        .x_label_area_size(x_area)
        .y_label_area_size(y_area)
        .build_cartesian_2d(axis.clone(), figure.y_range.clone())
        .map_err(render_err)?;

    let y_text = |y: &f64| format!("{y:.0}");
    let grid_style = if figure.grid {
        GRID_GRAY.stroke_width(opts.px(0.8))
    } else {
        TRANSPARENT.stroke_width(0)
    };
    chart
        .configure_mesh()
        .x_desc(figure.x_label)
        .y_desc(figure.y_label)
        .x_labels(figure.x_ticks.len())
        .y_labels(6)
        .y_label_formatter(&y_text)
        // tick text is drawn below, plotters only places the tick marks
        .x_label_style((FONT, label_px).into_font().color(&TRANSPARENT))
        .y_label_style((FONT, label_px))
        .axis_desc_style((FONT, label_px))
        .bold_line_style(grid_style)
        .light_line_style(TRANSPARENT)
        .axis_style(BLACK.stroke_width(opts.px(0.8)))
        .draw()
        .map_err(render_err)?;

    for x in axis.key_points(BoldPoints(figure.x_ticks.len())) {
        let (px, py) = chart.backend_coord(&(x, figure.y_range.start));
        root.draw_text(&figure.tick_label_at(x), &tick_style, (px, py + tick_gap))
            .map_err(render_err)?;
    }

    let line_px = opts.px(1.5);
    let legend_len = opts.size(20.0);
    for series in &figure.series {
        let color = series.color;
        chart
            .draw_series(LineSeries::new(
                series.points.iter().copied(),
                color.stroke_width(line_px),
            ))
            .map_err(render_err)?
            .label(series.label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + legend_len, y)], color.stroke_width(line_px))
            });
    }

    chart
        .configure_series_labels()
        .label_font((FONT, label_px))
        .margin(opts.size(4.0))
        .legend_area_size(legend_len + opts.size(8.0))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::LowerRight)
        .draw()
        .map_err(render_err)?;

    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/plot/render.rs"]
mod tests;
