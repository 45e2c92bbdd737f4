//! Error types for the alertplot-render crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rendering a chart.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A sample value could not be converted to a number.
    #[error("sample value not float in {series}: {value}")]
    Conversion {
        /// Canonical text of the offending series.
        series: String,
        /// The raw sample value.
        value: String,
    },

    /// The configured font could not be loaded.
    #[error("failed to load font {path}: {reason}")]
    Font {
        /// Path of the font file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The canvas could not be created.
    #[error("failed to create canvas: {0}")]
    Canvas(String),

    /// The palette has no colours.
    #[error("palette must contain at least one colour")]
    EmptyPalette,

    /// PNG encoding failed.
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
