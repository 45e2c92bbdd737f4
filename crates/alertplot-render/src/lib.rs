//! Chart rendering for alertplot.
//!
//! Charts are built in two steps. [`ChartLayout`] is the pure geometry: axes,
//! ticks, series polylines, the threshold band, the legend and the "latest
//! evaluation" annotation. [`Renderer`] rasterises a layout onto a PNG canvas.
//!
//! # Example
//!
//! ```rust
//! use alertplot_core::{Direction, Sample, TimeSeries};
//! use alertplot_render::{RenderConfig, Renderer};
//! use chrono::{TimeZone, Utc};
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let series = TimeSeries::new()
//!     .label("__name__", "queue_depth")
//!     .sample(Sample::new(t0, "12"))
//!     .sample(Sample::new(t0 + chrono::TimeDelta::minutes(1), "17"));
//!
//! let renderer = Renderer::new(RenderConfig::default()).unwrap();
//! let chart = renderer.render(&[series], 50.0, Direction::Greater).unwrap();
//! assert_eq!(chart.width, 756);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod layout;
pub mod palette;
pub mod renderer;

pub use config::RenderConfig;
pub use error::{RenderError, Result};
pub use layout::{Annotation, Axis, Band, ChartLayout, LegendEntry, PixelRect, SeriesLine, Tick};
pub use palette::{Palette, DARK2};
pub use renderer::{RenderedChart, Renderer};
