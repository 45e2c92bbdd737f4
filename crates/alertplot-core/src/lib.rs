//! Shared building blocks for alertplot.
//!
//! `alertplot-core` holds the types every other crate in the workspace agrees
//! on, plus the two small algorithms that sit between the expression analyzer
//! and the renderer:
//!
//! - [`QueryWindow`]: which time range to re-query for an alert
//! - [`select`]: which of the returned series actually triggered the alert
//!
//! # Example
//!
//! ```rust
//! use alertplot_core::{select, Labels, QueryWindow, Sample, Selection, TimeSeries};
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! let starts_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let window = QueryWindow::for_alert(starts_at, starts_at + TimeDelta::minutes(5));
//! assert_eq!(window.duration, TimeDelta::minutes(20));
//!
//! let series = vec![
//!     TimeSeries::new().label("job", "a").sample(Sample::new(starts_at, "1")),
//!     TimeSeries::new().label("job", "b").sample(Sample::new(starts_at, "2")),
//! ];
//! let mut alert_labels = Labels::new();
//! alert_labels.insert("job".to_string(), "b".to_string());
//!
//! match select(&series, &alert_labels) {
//!     Selection::Matched(s) => assert_eq!(s.labels["job"], "b"),
//!     Selection::All(_) => unreachable!(),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod select;
pub mod types;
pub mod window;

// Re-export main types at crate root
pub use error::{CoreError, Result};
pub use select::{labels_agree, select, Selection};
pub use types::{
    Alert, AlertingCondition, Direction, Labels, Sample, TimeSeries, METRIC_NAME_LABEL,
};
pub use window::{QueryWindow, MIN_LOOKBACK_MINUTES};
