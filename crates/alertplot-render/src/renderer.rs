//! PNG rasterisation of a [`ChartLayout`].

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use alertplot_core::{Direction, TimeSeries};
use image::{ImageFormat, Rgb, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_circle_mut, draw_filled_rect_mut,
    draw_line_segment_mut, draw_text_mut, text_size, Blend,
};
use imageproc::pixelops::interpolate;
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::layout::{ChartLayout, PixelRect};

/// Fonts tried in order when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID: Rgba<u8> = Rgba([220, 220, 220, 255]);
const BAND: Rgba<u8> = Rgba([255, 0, 0, 40]);
const LABEL_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 200]);
const ANNOTATION_TEXT: Rgba<u8> = Rgba([105, 105, 105, 255]);

/// An encoded chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    /// PNG bytes.
    pub bytes: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Draws charts with a fixed configuration.
///
/// A renderer is immutable once built and can be shared between threads.
pub struct Renderer {
    config: RenderConfig,
    font: Option<FontVec>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Renderer {
    /// Creates a renderer, loading the configured font.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Font` if an explicitly configured font cannot be
    /// loaded. Without a configured font, common system fonts are tried and
    /// charts are drawn without text if none is usable.
    pub fn new(config: RenderConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => Some(read_font(path)?),
            None => find_system_font(),
        };
        Ok(Self { config, font })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Returns true if text will be drawn.
    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Computes the chart geometry without drawing it.
    pub fn layout(
        &self,
        series: &[TimeSeries],
        threshold: f64,
        direction: Direction,
    ) -> Result<ChartLayout> {
        ChartLayout::compute(&self.config, series, threshold, direction)
    }

    /// Renders `series` against `threshold` as a PNG.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Conversion` if any sample is not numeric; no
    /// partial chart is produced.
    pub fn render(
        &self,
        series: &[TimeSeries],
        threshold: f64,
        direction: Direction,
    ) -> Result<RenderedChart> {
        let layout = self.layout(series, threshold, direction)?;
        let image = self.rasterize(&layout);

        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

        debug!(
            series = series.len(),
            width = layout.width,
            height = layout.height,
            bytes = bytes.len(),
            "chart rendered"
        );
        Ok(RenderedChart {
            bytes,
            width: layout.width,
            height: layout.height,
        })
    }

    fn rasterize(&self, layout: &ChartLayout) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(layout.width, layout.height, BACKGROUND);

        draw_grid(&mut image, layout);
        image = fill(image, &layout.band_rect(), BAND);
        draw_lines(&mut image, layout);
        draw_axes(&mut image, layout);

        if let Some(font) = &self.font {
            draw_tick_labels(&mut image, layout, font);
            image = draw_legend(image, layout, font);
            image = draw_annotation(image, layout, font);
        }
        image
    }
}

fn read_font(path: &Path) -> Result<FontVec> {
    let font_error = |reason: String| RenderError::Font {
        path: path.to_path_buf(),
        reason,
    };
    let data = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
    FontVec::try_from_vec(data).map_err(|e| font_error(e.to_string()))
}

fn find_system_font() -> Option<FontVec> {
    for candidate in SYSTEM_FONTS {
        let path = PathBuf::from(candidate);
        if let Ok(font) = read_font(&path) {
            debug!(path = %path.display(), "using system font");
            return Some(font);
        }
    }
    warn!("no usable font found, charts are drawn without text");
    None
}

fn rgba(Rgb([r, g, b]): Rgb<u8>) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

fn to_rect(rect: &PixelRect) -> Option<Rect> {
    let width = rect.width().round();
    let height = rect.height().round();
    if !(width >= 1.0 && height >= 1.0 && rect.left.is_finite() && rect.top.is_finite()) {
        return None;
    }
    Some(
        Rect::at(rect.left.round() as i32, rect.top.round() as i32)
            .of_size(width as u32, height as u32),
    )
}

/// Alpha-blends `color` over `area`.
fn fill(image: RgbaImage, area: &PixelRect, color: Rgba<u8>) -> RgbaImage {
    let Some(rect) = to_rect(area) else {
        return image;
    };
    let mut canvas = Blend(image);
    draw_filled_rect_mut(&mut canvas, rect, color);
    canvas.0
}

fn draw_grid(image: &mut RgbaImage, layout: &ChartLayout) {
    let plot = layout.plot;
    for tick in &layout.x_axis.ticks {
        let x = layout.x_to_px(tick.value);
        draw_line_segment_mut(image, (x, plot.top), (x, plot.bottom), GRID);
    }
    for tick in &layout.y_axis.ticks {
        let y = layout.y_to_px(tick.value);
        draw_line_segment_mut(image, (plot.left, y), (plot.right, y), GRID);
    }
}

fn draw_lines(image: &mut RgbaImage, layout: &ChartLayout) {
    for line in &layout.lines {
        let color = rgba(line.color);
        let pixels: Vec<Option<(i32, i32)>> = line
            .points
            .iter()
            .map(|&(x, y)| {
                y.is_finite().then(|| {
                    (
                        layout.x_to_px(x).round() as i32,
                        layout.y_to_px(y).round() as i32,
                    )
                })
            })
            .collect();

        if let [Some(point)] = pixels.as_slice() {
            draw_filled_circle_mut(image, *point, 2, color);
            continue;
        }
        for pair in pixels.windows(2) {
            if let [Some(start), Some(end)] = pair {
                draw_antialiased_line_segment_mut(image, *start, *end, color, interpolate);
            }
        }
    }
}

fn draw_axes(image: &mut RgbaImage, layout: &ChartLayout) {
    let plot = layout.plot;
    let tick_len = 1.5 * layout.px_per_mm;

    draw_line_segment_mut(image, (plot.left, plot.bottom), (plot.right, plot.bottom), AXIS);
    draw_line_segment_mut(image, (plot.left, plot.top), (plot.left, plot.bottom), AXIS);

    for tick in &layout.x_axis.ticks {
        let x = layout.x_to_px(tick.value);
        draw_line_segment_mut(image, (x, plot.bottom), (x, plot.bottom + tick_len), AXIS);
    }
    for tick in &layout.y_axis.ticks {
        let y = layout.y_to_px(tick.value);
        draw_line_segment_mut(image, (plot.left - tick_len, y), (plot.left, y), AXIS);
    }
}

fn measure(font: &FontVec, px: f32, text: &str) -> (f32, f32) {
    let (w, h) = text_size(PxScale::from(px), font, text);
    (w as f32, h as f32)
}

fn draw_tick_labels(image: &mut RgbaImage, layout: &ChartLayout, font: &FontVec) {
    let plot = layout.plot;
    let px = layout.tick_font_px;
    let offset = 2.5 * layout.px_per_mm;

    for tick in &layout.x_axis.ticks {
        let (w, _) = measure(font, px, &tick.label);
        let x = layout.x_to_px(tick.value) - w / 2.0;
        let y = plot.bottom + offset;
        draw_text_mut(image, AXIS, x as i32, y as i32, PxScale::from(px), font, &tick.label);
    }
    for tick in &layout.y_axis.ticks {
        let (w, h) = measure(font, px, &tick.label);
        let x = plot.left - offset - w;
        let y = layout.y_to_px(tick.value) - h / 2.0;
        draw_text_mut(image, AXIS, x as i32, y as i32, PxScale::from(px), font, &tick.label);
    }
}

/// Legend rows in the top-right corner of the plot area.
fn draw_legend(image: RgbaImage, layout: &ChartLayout, font: &FontVec) -> RgbaImage {
    if layout.legend.is_empty() {
        return image;
    }
    let px = layout.tick_font_px;
    let mm = layout.px_per_mm;
    let swatch = 5.0 * mm;
    let row_height = px * 1.3;

    let text_width = layout
        .legend
        .iter()
        .map(|entry| measure(font, px, &entry.label).0)
        .fold(0.0_f32, f32::max);
    let width = swatch + mm + text_width + 2.0 * mm;
    let height = row_height * layout.legend.len() as f32 + 2.0 * mm;

    let area = PixelRect {
        left: layout.plot.right - width - mm,
        top: layout.plot.top + mm,
        right: layout.plot.right - mm,
        bottom: layout.plot.top + mm + height,
    };
    let mut image = fill(image, &area, LABEL_BACKGROUND);

    for (row, entry) in layout.legend.iter().enumerate() {
        let top = area.top + mm + row_height * row as f32;
        let mid = top + row_height / 2.0;
        let x = area.left + mm;
        draw_line_segment_mut(&mut image, (x, mid), (x + swatch, mid), rgba(entry.color));
        draw_text_mut(
            &mut image,
            AXIS,
            (x + swatch + mm) as i32,
            top as i32,
            PxScale::from(px),
            font,
            &entry.label,
        );
    }
    image
}

fn draw_annotation(image: RgbaImage, layout: &ChartLayout, font: &FontVec) -> RgbaImage {
    let Some(annotation) = &layout.annotation else {
        return image;
    };
    let px = layout.annotation_font_px;
    let (w, h) = measure(font, px, &annotation.text);
    let Some((area, (x, y))) = layout.annotation_box(w, h) else {
        return image;
    };

    let mut image = fill(image, &area, LABEL_BACKGROUND);
    draw_text_mut(
        &mut image,
        ANNOTATION_TEXT,
        x as i32,
        y as i32,
        PxScale::from(px),
        font,
        &annotation.text,
    );
    image
}
