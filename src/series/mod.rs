//! Series shaping for chart output
//!
//! Raw categorical series from the stats API are unbounded (one entry per
//! distinct browser, country, referrer, ...). Charts need a bounded series,
//! so everything past the top N is collapsed into a single trailing
//! "Others" bucket. The tabular view bypasses bucketing entirely and shows
//! every row with both raw counts.

use serde::{Deserialize, Serialize};

/// Number of named entries a bucketed series may contain. The same limit
/// applies to every dimension so the charts stay visually consistent.
pub const TOP_N: usize = 7;

/// Label of the overflow bucket.
///
/// The bucket is a sentinel: clicking it in a chart never becomes a filter,
/// and it is skipped when computing share-of-total percentages.
pub const OTHERS_LABEL: &str = "Others";

/// A single labeled data point of a categorical series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: u64,
}

impl SeriesPoint {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A single row of the tabular (unbucketed) view: the raw total and unique
/// counts for one dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub label: String,
    pub total: u64,
    pub unique: u64,
}

/// True when `label` names the overflow bucket and must not be interactive.
pub fn is_others(label: &str) -> bool {
    label == OTHERS_LABEL
}

/// Collapse a series to at most `n + 1` entries.
///
/// The input is sorted descending by value (stable, so ties keep their
/// original relative order). If it already fits within `n` entries the
/// sorted series is returned unchanged; otherwise the top `n` entries are
/// kept and the rest are summed into a trailing "Others" entry.
pub fn bucket_top_n(series: &[SeriesPoint], n: usize) -> Vec<SeriesPoint> {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));

    if sorted.len() <= n {
        return sorted;
    }

    let overflow: u64 = sorted[n..].iter().map(|p| p.value).sum();
    sorted.truncate(n);
    sorted.push(SeriesPoint::new(OTHERS_LABEL, overflow));
    sorted
}

/// Share of one entry in the series total, as a fraction in `0.0..=1.0`.
///
/// The "Others" bucket takes no part in the computation: asking for its
/// share yields `None`, and its value is excluded from the denominator.
pub fn share_of_total(series: &[SeriesPoint], point: &SeriesPoint) -> Option<f64> {
    if is_others(&point.label) {
        return None;
    }

    let total: u64 = series
        .iter()
        .filter(|p| !is_others(&p.label))
        .map(|p| p.value)
        .sum();

    if total == 0 {
        return None;
    }

    Some(point.value as f64 / total as f64)
}

/// Join the total and unique series of one dimension into table rows.
///
/// Rows are keyed by label and ordered by total count descending. A label
/// present in only one of the two series gets 0 for the missing count.
pub fn table_rows(total: &[SeriesPoint], unique: &[SeriesPoint]) -> Vec<TableRow> {
    let mut rows: Vec<TableRow> = total
        .iter()
        .map(|p| TableRow {
            label: p.label.clone(),
            total: p.value,
            unique: 0,
        })
        .collect();

    for point in unique {
        match rows.iter_mut().find(|r| r.label == point.label) {
            Some(row) => row.unique = point.value,
            None => rows.push(TableRow {
                label: point.label.clone(),
                total: 0,
                unique: point.value,
            }),
        }
    }

    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(&str, u64)]) -> Vec<SeriesPoint> {
        points
            .iter()
            .map(|(label, value)| SeriesPoint::new(*label, *value))
            .collect()
    }

    #[test]
    fn test_bucket_below_limit_returns_sorted_input() {
        let input = series(&[("b", 2), ("a", 10), ("c", 5)]);
        let bucketed = bucket_top_n(&input, 7);

        assert_eq!(bucketed, series(&[("a", 10), ("c", 5), ("b", 2)]));
    }

    #[test]
    fn test_bucket_exactly_at_limit_has_no_others() {
        let input = series(&[("a", 3), ("b", 2), ("c", 1)]);
        let bucketed = bucket_top_n(&input, 3);

        assert_eq!(bucketed.len(), 3);
        assert!(bucketed.iter().all(|p| !is_others(&p.label)));
    }

    #[test]
    fn test_bucket_collapses_tail_into_others() {
        let input = series(&[
            ("a", 10),
            ("b", 9),
            ("c", 8),
            ("d", 7),
            ("e", 6),
            ("f", 5),
            ("g", 4),
            ("h", 3),
        ]);
        let bucketed = bucket_top_n(&input, 7);

        assert_eq!(bucketed.len(), 8);
        assert_eq!(bucketed[6], SeriesPoint::new("g", 4));
        assert_eq!(bucketed[7], SeriesPoint::new(OTHERS_LABEL, 3));
    }

    #[test]
    fn test_bucket_others_sums_whole_tail() {
        let input = series(&[("a", 5), ("b", 4), ("c", 3), ("d", 2), ("e", 1)]);
        let bucketed = bucket_top_n(&input, 2);

        assert_eq!(
            bucketed,
            series(&[("a", 5), ("b", 4), (OTHERS_LABEL, 6)])
        );
    }

    #[test]
    fn test_bucket_ties_keep_input_order() {
        let input = series(&[("x", 5), ("y", 5), ("z", 5)]);
        let bucketed = bucket_top_n(&input, 2);

        assert_eq!(bucketed[0].label, "x");
        assert_eq!(bucketed[1].label, "y");
        assert_eq!(bucketed[2], SeriesPoint::new(OTHERS_LABEL, 5));
    }

    #[test]
    fn test_share_of_total_excludes_others() {
        let bucketed = series(&[("a", 6), ("b", 2), (OTHERS_LABEL, 92)]);

        let share = share_of_total(&bucketed, &bucketed[0]).unwrap();
        assert!((share - 0.75).abs() < 1e-9);

        assert_eq!(share_of_total(&bucketed, &bucketed[2]), None);
    }

    #[test]
    fn test_share_of_total_empty_series() {
        assert_eq!(
            share_of_total(&[], &SeriesPoint::new("a", 1)),
            None
        );
    }

    #[test]
    fn test_table_rows_join_by_label() {
        let total = series(&[("chrome", 10), ("firefox", 4)]);
        let unique = series(&[("firefox", 3), ("chrome", 7), ("safari", 1)]);

        let rows = table_rows(&total, &unique);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            TableRow {
                label: "chrome".to_string(),
                total: 10,
                unique: 7,
            }
        );
        assert_eq!(rows[1].unique, 3);
        // Present only in the unique series: total counts as 0, sorts last.
        assert_eq!(rows[2].label, "safari");
        assert_eq!(rows[2].total, 0);
    }
}
