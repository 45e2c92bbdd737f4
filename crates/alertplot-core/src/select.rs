//! Series selection.
//!
//! A range query for an alert formula usually returns every series the
//! formula matches, not just the one that fired. [`select`] narrows the
//! result down to the first series that does not contradict the alert's
//! labels and falls back to plotting everything when nothing matches.

use tracing::{debug, info};

use crate::types::{Labels, TimeSeries};

/// Outcome of [`select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The first series whose labels agree with the alert.
    Matched(&'a TimeSeries),
    /// No series agreed; the whole input.
    All(&'a [TimeSeries]),
}

impl<'a> Selection<'a> {
    /// Returns the selected series as a slice.
    #[must_use]
    pub fn series(&self) -> &'a [TimeSeries] {
        match *self {
            Self::Matched(series) => std::slice::from_ref(series),
            Self::All(series) => series,
        }
    }

    /// Returns true if a single series matched.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

/// Returns true if every label the candidate shares with the alert has the
/// same value. A candidate sharing no labels agrees trivially.
#[must_use]
pub fn labels_agree(candidate: &Labels, alert_labels: &Labels) -> bool {
    candidate
        .iter()
        .all(|(name, value)| alert_labels.get(name).is_none_or(|wanted| wanted == value))
}

/// Picks the first series whose labels agree with `alert_labels`, in input
/// order, or returns the whole collection when none does.
#[must_use]
pub fn select<'a>(series: &'a [TimeSeries], alert_labels: &Labels) -> Selection<'a> {
    for candidate in series {
        debug!(series = %candidate, "metric fetched");
        if labels_agree(&candidate.labels, alert_labels) {
            info!(series = %candidate, "best match found");
            return Selection::Matched(candidate);
        }
    }

    info!(
        labels = ?alert_labels,
        count = series.len(),
        "best match not found, using entire dataset"
    );
    Selection::All(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn series(pairs: &[(&str, &str)]) -> TimeSeries {
        TimeSeries::with_samples(labels(pairs), Vec::new())
    }

    #[test]
    fn selects_matching_series() {
        let input = vec![series(&[("job", "a")]), series(&[("job", "b")])];
        let selection = select(&input, &labels(&[("job", "b")]));
        assert_eq!(selection, Selection::Matched(&input[1]));
        assert_eq!(selection.series().len(), 1);
    }

    #[test]
    fn falls_back_to_everything() {
        let input = vec![series(&[("job", "a")]), series(&[("job", "b")])];
        let selection = select(&input, &labels(&[("job", "c")]));
        assert_eq!(selection, Selection::All(&input));
        assert!(!selection.is_matched());
        assert_eq!(selection.series().len(), 2);
    }

    #[test]
    fn first_match_wins_over_better_match() {
        let input = vec![
            series(&[("job", "a")]),
            series(&[("job", "a"), ("instance", "x")]),
        ];
        let alert = labels(&[("job", "a"), ("instance", "x")]);
        assert_eq!(select(&input, &alert), Selection::Matched(&input[0]));
    }

    #[test]
    fn candidate_with_fewer_labels_matches() {
        let input = vec![series(&[("instance", "x")])];
        let alert = labels(&[("job", "a"), ("instance", "x"), ("severity", "page")]);
        assert!(select(&input, &alert).is_matched());
    }

    #[test]
    fn extra_candidate_labels_are_ignored() {
        let input = vec![series(&[("__name__", "up"), ("job", "a"), ("pod", "p-1")])];
        assert!(select(&input, &labels(&[("job", "a")])).is_matched());
    }

    #[test]
    fn no_shared_labels_agrees() {
        let input = vec![series(&[("pod", "p-1")])];
        assert!(select(&input, &labels(&[("job", "a")])).is_matched());
    }

    #[test]
    fn one_conflict_rejects() {
        let input = vec![series(&[("job", "a"), ("instance", "y")])];
        let alert = labels(&[("job", "a"), ("instance", "x")]);
        assert!(!select(&input, &alert).is_matched());
    }

    #[test]
    fn empty_input() {
        let input: Vec<TimeSeries> = Vec::new();
        let selection = select(&input, &labels(&[("job", "a")]));
        assert!(selection.series().is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn label_set() -> impl Strategy<Value = Labels> {
            prop::collection::btree_map("[a-c]", "[x-z]", 0..3)
        }

        proptest! {
            #[test]
            fn selection_is_deterministic(
                candidates in prop::collection::vec(label_set(), 0..6),
                alert in label_set(),
            ) {
                let input: Vec<TimeSeries> = candidates
                    .into_iter()
                    .map(|l| TimeSeries::with_samples(l, Vec::new()))
                    .collect();
                prop_assert_eq!(select(&input, &alert), select(&input, &alert));
            }

            #[test]
            fn matched_series_is_first_agreeing(
                candidates in prop::collection::vec(label_set(), 1..6),
                alert in label_set(),
            ) {
                let input: Vec<TimeSeries> = candidates
                    .into_iter()
                    .map(|l| TimeSeries::with_samples(l, Vec::new()))
                    .collect();
                let first = input.iter().position(|s| labels_agree(&s.labels, &alert));
                match select(&input, &alert) {
                    Selection::Matched(s) => prop_assert_eq!(Some(s), first.map(|i| &input[i])),
                    Selection::All(all) => {
                        prop_assert!(first.is_none());
                        prop_assert_eq!(all.len(), input.len());
                    }
                }
            }
        }
    }
}
