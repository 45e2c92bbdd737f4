//! Core types shared across alertplot.
//!
//! - [`Direction`]: which side of a threshold counts as breached
//! - [`AlertingCondition`]: one `(formula, direction, threshold)` triple
//! - [`Alert`]: the alert as handed over by the webhook layer
//! - [`Sample`] and [`TimeSeries`]: range query results

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Label set of an alert or a series, ordered by label name.
pub type Labels = BTreeMap<String, String>;

/// Reserved label holding a series' metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// The side of a threshold that represents a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Values below the threshold are flagged.
    Less,
    /// Values above the threshold are flagged.
    Greater,
}

impl Direction {
    /// Returns the direction as a comparison symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Greater => ">",
        }
    }

    /// Returns true if `value` lies on the breached side of `threshold`.
    #[must_use]
    pub fn is_breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Less => value < threshold,
            Self::Greater => value > threshold,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// A threshold condition recovered from an alerting expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertingCondition {
    /// The query whose values are compared, in canonical PromQL form.
    pub formula: String,
    /// Which side of the threshold fires the alert.
    pub direction: Direction,
    /// The threshold the formula is compared against.
    pub threshold: f64,
}

impl AlertingCondition {
    /// Creates a new condition.
    #[must_use]
    pub fn new(formula: impl Into<String>, direction: Direction, threshold: f64) -> Self {
        Self {
            formula: formula.into(),
            direction,
            threshold,
        }
    }
}

impl fmt::Display for AlertingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.formula, self.direction, self.threshold)
    }
}

/// An alert as received from the upstream alerting system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Labels identifying the alert instance.
    pub labels: Labels,
    /// Free-form annotations such as `summary` or `description`.
    pub annotations: Labels,
    /// When the alert started firing.
    pub starts_at: DateTime<Utc>,
    /// When the alert ended. Still-firing alerts carry a value before `starts_at`.
    pub ends_at: DateTime<Utc>,
    /// The alerting expression that produced this alert.
    pub generator_expression: String,
}

impl Alert {
    /// Creates an alert without labels or annotations.
    #[must_use]
    pub fn new(
        generator_expression: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            labels: Labels::new(),
            annotations: Labels::new(),
            starts_at,
            ends_at,
            generator_expression: generator_expression.into(),
        }
    }

    /// Adds a label and returns self for chaining.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation and returns self for chaining.
    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the `summary` annotation, or an empty string.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.annotations.get("summary").map_or("", String::as_str)
    }
}

/// A single sample of a range query result.
///
/// The value is kept as the text the backend returned so conversion failures
/// surface where the number is actually needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Evaluation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Raw sample value.
    pub value: String,
}

impl Sample {
    /// Creates a new sample.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    /// Parses the raw value as a float. Accepts `NaN` and `+Inf`/`-Inf`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Conversion` if the value is not numeric.
    pub fn parse_value(&self) -> Result<f64> {
        self.value
            .parse::<f64>()
            .map_err(|_| CoreError::Conversion {
                value: self.value.clone(),
            })
    }

    /// Returns the timestamp as fractional Unix seconds.
    #[must_use]
    pub fn unix_seconds(&self) -> f64 {
        self.timestamp.timestamp_millis() as f64 / 1000.0
    }
}

/// A labelled, time-ordered sequence of samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Series labels, including `__name__` when the backend reports one.
    pub labels: Labels,
    /// Samples in ascending timestamp order.
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Creates an empty series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a series with the given labels and samples.
    #[must_use]
    pub const fn with_samples(labels: Labels, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }

    /// Adds a label and returns self for chaining.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Appends a sample and returns self for chaining.
    #[must_use]
    pub fn sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    /// Returns the metric name, if the series carries one.
    #[must_use]
    pub fn metric_name(&self) -> Option<&str> {
        self.labels.get(METRIC_NAME_LABEL).map(String::as_str)
    }

    /// Returns the most recent sample.
    #[must_use]
    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Canonical label-set text: `name{a="1", b="2"}`, `name`, or `{}`.
impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.metric_name().unwrap_or_default();
        let pairs: Vec<String> = self
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect();

        if pairs.is_empty() {
            if self.metric_name().is_some() {
                return f.write_str(name);
            }
            return f.write_str("{}");
        }
        write!(f, "{name}{{{}}}", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    mod direction_tests {
        use super::*;

        #[test]
        fn direction_symbol() {
            assert_eq!(Direction::Less.as_symbol(), "<");
            assert_eq!(Direction::Greater.as_symbol(), ">");
            assert_eq!(Direction::Greater.to_string(), ">");
        }

        #[test]
        fn direction_breached() {
            assert!(Direction::Greater.is_breached(51.0, 50.0));
            assert!(!Direction::Greater.is_breached(50.0, 50.0));
            assert!(Direction::Less.is_breached(1.0, 5.0));
            assert!(!Direction::Less.is_breached(6.0, 5.0));
        }

        #[test]
        fn direction_serialization() {
            let json = serde_json::to_string(&Direction::Less).unwrap();
            assert_eq!(json, "\"less\"");
        }
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn condition_display() {
            let c = AlertingCondition::new("up", Direction::Less, 1.0);
            assert_eq!(c.to_string(), "up < 1");
        }
    }

    mod alert_tests {
        use super::*;

        #[test]
        fn alert_builder() {
            let alert = Alert::new("up < 1", ts(), ts())
                .label("job", "node")
                .annotation("summary", "node down");
            assert_eq!(alert.labels["job"], "node");
            assert_eq!(alert.summary(), "node down");
        }

        #[test]
        fn alert_summary_missing() {
            let alert = Alert::new("up < 1", ts(), ts());
            assert_eq!(alert.summary(), "");
        }
    }

    mod sample_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("1", 1.0 ; "integer")]
        #[test_case("0.25", 0.25 ; "decimal")]
        #[test_case("-3e2", -300.0 ; "exponent")]
        #[test_case("+Inf", f64::INFINITY ; "positive infinity")]
        #[test_case("-Inf", f64::NEG_INFINITY ; "negative infinity")]
        fn parse_numeric(raw: &str, expected: f64) {
            let sample = Sample::new(ts(), raw);
            assert_eq!(sample.parse_value().unwrap(), expected);
        }

        #[test]
        fn parse_nan() {
            let sample = Sample::new(ts(), "NaN");
            assert!(sample.parse_value().unwrap().is_nan());
        }

        #[test_case("" ; "empty")]
        #[test_case("abc" ; "word")]
        #[test_case("1,5" ; "comma decimal")]
        fn parse_non_numeric(raw: &str) {
            let sample = Sample::new(ts(), raw);
            assert_eq!(
                sample.parse_value(),
                Err(CoreError::Conversion {
                    value: raw.to_string()
                })
            );
        }

        #[test]
        fn unix_seconds_keeps_millis() {
            let sample = Sample::new(ts() + chrono::TimeDelta::milliseconds(500), "1");
            assert!((sample.unix_seconds() - 1_714_564_800.5).abs() < f64::EPSILON);
        }
    }

    mod series_tests {
        use super::*;

        #[test]
        fn display_with_name_and_labels() {
            let series = TimeSeries::new()
                .label("__name__", "up")
                .label("job", "node")
                .label("instance", "a:9100");
            assert_eq!(series.to_string(), r#"up{instance="a:9100", job="node"}"#);
        }

        #[test]
        fn display_labels_only() {
            let series = TimeSeries::new().label("job", "node");
            assert_eq!(series.to_string(), r#"{job="node"}"#);
        }

        #[test]
        fn display_name_only() {
            let series = TimeSeries::new().label("__name__", "up");
            assert_eq!(series.to_string(), "up");
        }

        #[test]
        fn display_empty() {
            assert_eq!(TimeSeries::new().to_string(), "{}");
        }

        #[test]
        fn display_escapes_quotes() {
            let series = TimeSeries::new().label("path", "a\"b");
            assert_eq!(series.to_string(), r#"{path="a\"b"}"#);
        }

        #[test]
        fn last_sample() {
            let series = TimeSeries::new()
                .sample(Sample::new(ts(), "1"))
                .sample(Sample::new(ts(), "2"));
            assert_eq!(series.last_sample().map(|s| s.value.as_str()), Some("2"));
            assert!(TimeSeries::new().last_sample().is_none());
        }
    }
}
