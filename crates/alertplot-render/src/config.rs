//! Render configuration.

use std::path::PathBuf;

use crate::palette::Palette;

const MM_PER_INCH: f32 = 25.4;

/// Canvas geometry, font and colours used for every chart.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Canvas width in centimetres.
    pub width_cm: f32,
    /// Canvas height in centimetres.
    pub height_cm: f32,
    /// Uniform margin around the chart in millimetres.
    pub margin_mm: f32,
    /// Pixels per inch used to convert physical sizes.
    pub dpi: f32,
    /// Fraction of the value span added above and below the Y range.
    pub y_padding: f64,
    /// Font size of tick labels and the legend in millimetres.
    pub tick_font_mm: f32,
    /// Font size of the evaluation annotation in millimetres.
    pub annotation_font_mm: f32,
    /// TrueType/OpenType font file. When unset, common system fonts are tried.
    pub font_path: Option<PathBuf>,
    /// Series colours.
    pub palette: Palette,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width_cm: 20.0,
            height_cm: 10.0,
            margin_mm: 6.0,
            dpi: 96.0,
            y_padding: 0.05,
            tick_font_mm: 3.0,
            annotation_font_mm: 5.0,
            font_path: None,
            palette: Palette::dark2(),
        }
    }
}

impl RenderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the canvas size in centimetres.
    #[must_use]
    pub fn with_size_cm(mut self, width: f32, height: f32) -> Self {
        self.width_cm = width;
        self.height_cm = height;
        self
    }

    /// Sets the margin in millimetres.
    #[must_use]
    pub fn with_margin_mm(mut self, margin: f32) -> Self {
        self.margin_mm = margin;
        self
    }

    /// Sets the resolution.
    #[must_use]
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Sets the Y range padding fraction.
    #[must_use]
    pub fn with_y_padding(mut self, padding: f64) -> Self {
        self.y_padding = padding;
        self
    }

    /// Sets the font file.
    #[must_use]
    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    /// Sets the series palette.
    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Converts millimetres to pixels at the configured resolution.
    #[must_use]
    pub fn mm_to_px(&self, mm: f32) -> f32 {
        mm / MM_PER_INCH * self.dpi
    }

    /// Canvas width in pixels.
    #[must_use]
    pub fn width_px(&self) -> u32 {
        self.mm_to_px(self.width_cm * 10.0).round() as u32
    }

    /// Canvas height in pixels.
    #[must_use]
    pub fn height_px(&self) -> u32 {
        self.mm_to_px(self.height_cm * 10.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_canvas_is_20_by_10_cm_at_96_dpi() {
        let config = RenderConfig::default();
        assert_eq!(config.width_px(), 756);
        assert_eq!(config.height_px(), 378);
        assert!((config.mm_to_px(6.0) - 22.677).abs() < 0.01);
    }

    #[test]
    fn builder() {
        let config = RenderConfig::new()
            .with_size_cm(10.0, 5.0)
            .with_dpi(254.0)
            .with_margin_mm(2.0)
            .with_y_padding(0.0)
            .with_font_path("/fonts/a.ttf");
        assert_eq!(config.width_px(), 1000);
        assert_eq!(config.height_px(), 500);
        assert!((config.mm_to_px(config.margin_mm) - 20.0).abs() < 1e-4);
        assert_eq!(config.font_path, Some(PathBuf::from("/fonts/a.ttf")));
    }
}
