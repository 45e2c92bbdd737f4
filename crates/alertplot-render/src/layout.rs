//! Chart geometry.
//!
//! [`ChartLayout::compute`] turns series and a threshold into everything the
//! rasteriser needs: auto-ranged axes with tick labels, the plot area in
//! canvas pixels, one polyline per series, the threshold band, the legend
//! and the evaluation annotation. Nothing here touches pixels or fonts, so
//! the geometry is tested directly.

use alertplot_core::{Direction, TimeSeries};
use chrono::DateTime;
use image::Rgb;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};

/// Inner label content of a series' canonical text.
static LEGEND_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(.*)\}").unwrap_or_else(|_| unreachable!()));

/// Tick steps for the time axis, in seconds.
const TIME_STEPS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
    10800.0, 21600.0, 43200.0, 86400.0,
];

const SECONDS_PER_DAY: f64 = 86400.0;

/// Preferred number of value ticks.
const VALUE_TICKS: usize = 5;

/// Average glyph advance relative to the font size, used to reserve room for
/// tick labels before any font is loaded.
const GLYPH_ASPECT: f32 = 0.6;

/// Value labels switch to scientific notation past this many integer or
/// fractional digits.
const MAX_FIXED_DIGITS: f64 = 6.0;

/// Significant digits f64 can carry.
const MAX_PRECISION: f64 = 15.0;

/// Text of the evaluation annotation.
#[must_use]
pub fn annotation_text(value: f64) -> String {
    format!("latest evaluation: {value:.2}")
}

/// Extracts the legend label of a series, or `None` if it has no braces.
#[must_use]
pub fn legend_label(series: &TimeSeries) -> Option<String> {
    LEGEND_LABEL
        .captures(&series.to_string())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// An axis-aligned rectangle in canvas pixels, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl PixelRect {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Returns true if `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }
}

/// A labelled tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Position in data coordinates.
    pub value: f64,
    /// Label text.
    pub label: String,
}

/// An auto-ranged axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// Lower bound in data coordinates.
    pub min: f64,
    /// Upper bound in data coordinates.
    pub max: f64,
    /// Ticks between `min` and `max`, ascending.
    pub ticks: Vec<Tick>,
}

impl Axis {
    fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// The shaded threshold region, as Y bounds in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Lower edge.
    pub from: f64,
    /// Upper edge.
    pub to: f64,
}

/// One series as a polyline in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLine {
    /// Line colour.
    pub color: Rgb<u8>,
    /// `(unix seconds, value)` pairs in sample order.
    pub points: Vec<(f64, f64)>,
}

/// A legend row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    /// Label text.
    pub label: String,
    /// Colour of the series' line.
    pub color: Rgb<u8>,
}

/// The "latest evaluation" label.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// The value being annotated.
    pub value: f64,
    /// Text to draw.
    pub text: String,
    /// Bottom-right corner of the text in canvas pixels.
    pub anchor: (f32, f32),
}

/// Everything needed to draw a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Data area in canvas pixels.
    pub plot: PixelRect,
    /// Time axis, in Unix seconds.
    pub x_axis: Axis,
    /// Value axis.
    pub y_axis: Axis,
    /// One line per input series, in input order.
    pub lines: Vec<SeriesLine>,
    /// Threshold band.
    pub band: Band,
    /// Legend rows; empty for a single series.
    pub legend: Vec<LegendEntry>,
    /// Evaluation annotation, if the last series has a finite last value.
    pub annotation: Option<Annotation>,
    /// Font size of tick labels and the legend in pixels.
    pub tick_font_px: f32,
    /// Font size of the annotation in pixels.
    pub annotation_font_px: f32,
    /// Pixels per millimetre.
    pub px_per_mm: f32,
}

impl ChartLayout {
    /// Lays out a chart of `series` against `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Conversion` if any sample is not numeric and
    /// `RenderError::Canvas` if the configured canvas leaves no room to plot
    /// or the values span more than an f64 can hold.
    pub fn compute(
        config: &RenderConfig,
        series: &[TimeSeries],
        threshold: f64,
        direction: Direction,
    ) -> Result<Self> {
        if !(config.dpi.is_finite() && config.dpi > 0.0) {
            return Err(RenderError::Canvas(format!("invalid dpi {}", config.dpi)));
        }
        let width = config.width_px();
        let height = config.height_px();
        if width == 0 || height == 0 {
            return Err(RenderError::Canvas(format!("empty canvas {width}x{height}")));
        }

        let lines = series
            .iter()
            .enumerate()
            .map(|(index, s)| {
                points(s).map(|points| SeriesLine {
                    color: config.palette.color(index),
                    points,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (x_min, x_max) = time_range(&lines);
        let (y_min, y_max) = value_range(&lines, threshold, config.y_padding);
        if !(y_min.is_finite() && y_max.is_finite() && (y_max - y_min).is_finite()) {
            return Err(RenderError::Canvas(format!(
                "value range {y_min}..{y_max} cannot be drawn"
            )));
        }
        let y_ticks = value_ticks(y_min, y_max);

        let px_per_mm = config.mm_to_px(1.0);
        let tick_font_px = config.mm_to_px(config.tick_font_mm);
        let plot = plot_area(config, width, height, &y_ticks, tick_font_px);
        if plot.width() < 1.0 || plot.height() < 1.0 {
            return Err(RenderError::Canvas(format!(
                "margins leave no plot area on a {width}x{height} canvas"
            )));
        }

        let label_px = tick_font_px * GLYPH_ASPECT * "00:00:00".len() as f32;
        let max_x_ticks = ((plot.width() / (label_px * 1.5)).floor() as usize).max(2);

        let band = band(direction, threshold, y_min, y_max);
        let legend = if series.len() > 1 {
            series
                .iter()
                .zip(&lines)
                .filter_map(|(s, line)| {
                    legend_label(s).map(|label| LegendEntry {
                        label,
                        color: line.color,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut layout = Self {
            width,
            height,
            plot,
            x_axis: Axis {
                min: x_min,
                max: x_max,
                ticks: time_ticks(x_min, x_max, max_x_ticks),
            },
            y_axis: Axis {
                min: y_min,
                max: y_max,
                ticks: y_ticks,
            },
            lines,
            band,
            legend,
            annotation: None,
            tick_font_px,
            annotation_font_px: config.mm_to_px(config.annotation_font_mm),
            px_per_mm,
        };

        let last_value = layout
            .lines
            .iter()
            .rev()
            .find_map(|line| line.points.last())
            .map(|&(_, value)| value)
            .filter(|value| value.is_finite());
        let annotation = last_value.map(|value| Annotation {
            value,
            text: annotation_text(value),
            anchor: (
                layout.x_to_px(layout.x_axis.max) - 6.0 * px_per_mm,
                layout.y_to_px(value),
            ),
        });
        layout.annotation = annotation;

        Ok(layout)
    }

    /// Converts a time in Unix seconds to a canvas x coordinate.
    #[must_use]
    pub fn x_to_px(&self, x: f64) -> f32 {
        let ratio = (x - self.x_axis.min) / self.x_axis.span();
        self.plot.left + (ratio as f32) * self.plot.width()
    }

    /// Converts a value to a canvas y coordinate.
    #[must_use]
    pub fn y_to_px(&self, y: f64) -> f32 {
        let ratio = (y - self.y_axis.min) / self.y_axis.span();
        self.plot.bottom - (ratio as f32) * self.plot.height()
    }

    /// The threshold band in canvas pixels, spanning the full plot width.
    #[must_use]
    pub fn band_rect(&self) -> PixelRect {
        PixelRect {
            left: self.plot.left,
            top: self.y_to_px(self.band.to),
            right: self.plot.right,
            bottom: self.y_to_px(self.band.from),
        }
    }

    /// Places the annotation background box for text of the given pixel size.
    ///
    /// Returns the box and the top-left corner of the text. The text's
    /// bottom-right corner sits on the anchor unless the box would leave the
    /// canvas, in which case both are shifted back inside.
    #[must_use]
    pub fn annotation_box(
        &self,
        text_width: f32,
        text_height: f32,
    ) -> Option<(PixelRect, (f32, f32))> {
        let annotation = self.annotation.as_ref()?;
        let (ax, ay) = annotation.anchor;
        let pad = self.px_per_mm;

        let mut rect = PixelRect {
            left: ax - text_width - pad,
            top: ay - text_height - pad,
            right: ax + pad,
            bottom: ay + pad,
        };
        let canvas_w = self.width as f32;
        let canvas_h = self.height as f32;

        let dx = if rect.left < 0.0 {
            -rect.left
        } else if rect.right > canvas_w {
            canvas_w - rect.right
        } else {
            0.0
        };
        let dy = if rect.top < 0.0 {
            -rect.top
        } else if rect.bottom > canvas_h {
            canvas_h - rect.bottom
        } else {
            0.0
        };
        rect.left += dx;
        rect.right += dx;
        rect.top += dy;
        rect.bottom += dy;

        Some((rect, (ax - text_width + dx, ay - text_height + dy)))
    }
}

fn points(series: &TimeSeries) -> Result<Vec<(f64, f64)>> {
    series
        .samples
        .iter()
        .map(|sample| {
            sample
                .parse_value()
                .map(|value| (sample.unix_seconds(), value))
                .map_err(|_| RenderError::Conversion {
                    series: series.to_string(),
                    value: sample.value.clone(),
                })
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn widen(lo: f64, hi: f64, half: f64) -> (f64, f64) {
    if hi > lo { (lo, hi) } else { (lo - half, hi + half) }
}

fn time_range(lines: &[SeriesLine]) -> (f64, f64) {
    let xs = lines.iter().flat_map(|line| line.points.iter().map(|p| p.0));
    match bounds(xs) {
        Some((lo, hi)) => widen(lo, hi, 30.0),
        None => (0.0, 60.0),
    }
}

/// Y range covering every finite value and the threshold, padded by
/// `padding` of the span on both sides.
fn value_range(lines: &[SeriesLine], threshold: f64, padding: f64) -> (f64, f64) {
    let ys = lines.iter().flat_map(|line| line.points.iter().map(|p| p.1));
    let (lo, hi) = match bounds(ys.chain(std::iter::once(threshold))) {
        Some((lo, hi)) => widen(lo, hi, (lo.abs() * 0.1).max(1.0)),
        None => (0.0, 1.0),
    };
    let pad = (hi - lo) * padding.max(0.0);
    (lo - pad, hi + pad)
}

fn band(direction: Direction, threshold: f64, y_min: f64, y_max: f64) -> Band {
    let level = if threshold.is_nan() {
        match direction {
            Direction::Less => y_min,
            Direction::Greater => y_max,
        }
    } else {
        threshold.clamp(y_min, y_max)
    };
    match direction {
        Direction::Less => Band {
            from: y_min,
            to: level,
        },
        Direction::Greater => Band {
            from: level,
            to: y_max,
        },
    }
}

/// Rounds `raw` up to 1, 2 or 5 times a power of ten.
fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn ticks_between(min: f64, max: f64, step: f64, label: impl Fn(f64) -> String) -> Vec<Tick> {
    let epsilon = step * 1e-9;
    let first = (min / step).ceil() * step;
    (0..100u32)
        .map(|i| first + f64::from(i) * step)
        .take_while(|value| *value <= max + epsilon)
        .map(|value| {
            let value = if value.abs() < epsilon { 0.0 } else { value };
            Tick {
                label: label(value),
                value,
            }
        })
        .collect()
}

fn value_ticks(min: f64, max: f64) -> Vec<Tick> {
    let step = nice_step((max - min) / VALUE_TICKS as f64);
    if !(step.is_finite() && step > 0.0) {
        return Vec::new();
    }
    let exponent = step.log10().floor();
    let largest = min.abs().max(max.abs());
    if exponent < -MAX_FIXED_DIGITS || largest >= 10f64.powf(MAX_FIXED_DIGITS) {
        let precision = (largest.log10().floor() - exponent).clamp(0.0, MAX_PRECISION) as usize;
        ticks_between(min, max, step, |value| format!("{value:.precision$e}"))
    } else {
        let decimals = (-exponent).max(0.0) as usize;
        ticks_between(min, max, step, |value| format!("{value:.decimals$}"))
    }
}

/// Formats Unix seconds as `HH:MM:SS` UTC.
#[must_use]
pub fn format_time(seconds: f64) -> String {
    DateTime::from_timestamp(seconds.floor() as i64, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn time_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<Tick> {
    let span = max - min;
    let step = TIME_STEPS
        .iter()
        .copied()
        .find(|step| span / step <= max_ticks as f64)
        .unwrap_or_else(|| SECONDS_PER_DAY * (span / SECONDS_PER_DAY / max_ticks as f64).ceil());
    ticks_between(min, max, step, format_time)
}

fn plot_area(
    config: &RenderConfig,
    width: u32,
    height: u32,
    y_ticks: &[Tick],
    font_px: f32,
) -> PixelRect {
    let margin = config.mm_to_px(config.margin_mm);
    let tick_len = config.mm_to_px(1.5);
    let gap = config.mm_to_px(1.0);
    let label_chars = y_ticks.iter().map(|t| t.label.len()).max().unwrap_or(1);
    let label_width = label_chars as f32 * font_px * GLYPH_ASPECT;

    PixelRect {
        left: margin + label_width + gap + tick_len,
        top: margin,
        right: width as f32 - margin,
        bottom: height as f32 - margin - font_px - gap - tick_len,
    }
}
