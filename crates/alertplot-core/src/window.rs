//! Query window derivation.
//!
//! An alert's firing interval decides which range is re-queried for the
//! chart. Every window covers at least [`MIN_LOOKBACK_MINUTES`] so even an
//! alert that resolved instantly is shown with some context.

use chrono::{DateTime, TimeDelta, Utc};

/// Minimum span of a query window, in minutes.
pub const MIN_LOOKBACK_MINUTES: i64 = 20;

/// The time range to query for an alert, expressed as an end and a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    /// End of the range (the evaluation time of the query).
    pub end: DateTime<Utc>,
    /// Length of the range, looking back from `end`.
    pub duration: TimeDelta,
}

impl QueryWindow {
    /// Derives the window for an alert using the default minimum lookback.
    #[must_use]
    pub fn for_alert(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self::with_min_lookback(starts_at, ends_at, TimeDelta::minutes(MIN_LOOKBACK_MINUTES))
    }

    /// Derives the window for an alert with a custom minimum lookback.
    ///
    /// An alert whose `ends_at` is before `starts_at` is still firing: the
    /// window ends at `starts_at` and spans exactly `min_lookback`. Otherwise
    /// the window ends at `ends_at` and spans the firing interval, never less
    /// than `min_lookback`.
    #[must_use]
    pub fn with_min_lookback(
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        min_lookback: TimeDelta,
    ) -> Self {
        if starts_at > ends_at {
            return Self {
                end: starts_at,
                duration: min_lookback,
            };
        }

        Self {
            end: ends_at,
            duration: (ends_at - starts_at).max(min_lookback),
        }
    }

    /// Creates a window ending at `end` and spanning `duration`.
    #[must_use]
    pub const fn ending_at(end: DateTime<Utc>, duration: TimeDelta) -> Self {
        Self { end, duration }
    }

    /// Returns the start of the range.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.end - self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test_case(5, 5, 20 ; "short alert is clamped")]
    #[test_case(60, 60, 60 ; "long alert keeps its span")]
    #[test_case(20, 20, 20 ; "exactly the minimum")]
    #[test_case(0, 0, 20 ; "instantly resolved")]
    #[test_case(-1, 0, 20 ; "end before start")]
    fn window_for_alert(end_offset_mins: i64, expected_end_mins: i64, expected_duration_mins: i64) {
        let window = QueryWindow::for_alert(t0(), t0() + TimeDelta::minutes(end_offset_mins));
        assert_eq!(window.end, t0() + TimeDelta::minutes(expected_end_mins));
        assert_eq!(window.duration, TimeDelta::minutes(expected_duration_mins));
    }

    #[test]
    fn firing_alert_with_zero_end() {
        // Alertmanager reports 0001-01-01T00:00:00Z for alerts without an end.
        let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        let window = QueryWindow::for_alert(t0(), zero);
        assert_eq!(window.end, t0());
        assert_eq!(window.duration, TimeDelta::minutes(20));
    }

    #[test]
    fn ends_at_earlier_in_the_minute_is_not_treated_as_firing() {
        let starts_at = t0() + TimeDelta::seconds(50);
        let ends_at = t0() + TimeDelta::minutes(30) + TimeDelta::seconds(10);
        let window = QueryWindow::for_alert(starts_at, ends_at);
        assert_eq!(window.end, ends_at);
        assert_eq!(window.duration, ends_at - starts_at);
    }

    #[test]
    fn custom_min_lookback() {
        let window =
            QueryWindow::with_min_lookback(t0(), t0() + TimeDelta::minutes(5), TimeDelta::hours(1));
        assert_eq!(window.duration, TimeDelta::hours(1));
    }

    #[test]
    fn start_is_end_minus_duration() {
        let window = QueryWindow::for_alert(t0(), t0() + TimeDelta::hours(1));
        assert_eq!(window.start(), t0());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_never_shorter_than_minimum(start in -1_000_000i64..1_000_000, end in -1_000_000i64..1_000_000) {
                let starts_at = t0() + TimeDelta::seconds(start);
                let ends_at = t0() + TimeDelta::seconds(end);
                let window = QueryWindow::for_alert(starts_at, ends_at);
                prop_assert!(window.duration >= TimeDelta::minutes(MIN_LOOKBACK_MINUTES));
                prop_assert_eq!(window.end, starts_at.max(ends_at));
            }
        }
    }
}
