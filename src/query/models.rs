//! Wire models for the stats aggregation API
//!
//! The response carries one array per `(metric, dimension)` pair under keys
//! like `clicks_by_browser` or `unique_clicks_by_time`. Each row names the
//! dimension value under the dimension's own field, so rows are kept as raw
//! JSON objects and extracted into typed series on demand.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::filters::FilterDimension;
use crate::series::SeriesPoint;

/// The two metrics the dashboard queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Clicks,
    UniqueClicks,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Clicks, Metric::UniqueClicks];

    pub fn field(self) -> &'static str {
        match self {
            Metric::Clicks => "clicks",
            Metric::UniqueClicks => "unique_clicks",
        }
    }
}

/// Headline totals for the selected range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub unique_clicks: u64,
    #[serde(default)]
    pub links: u64,
}

/// How the server bucketed the time axis (minute/hour/day), informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucketInfo {
    #[serde(default)]
    pub strategy: String,
}

/// A full `/stats` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub metrics: BTreeMap<String, Vec<serde_json::Map<String, Value>>>,
    #[serde(default)]
    pub time_bucket_info: Option<TimeBucketInfo>,
}

impl StatsResponse {
    /// The categorical series for one dimension and metric, e.g.
    /// `clicks_by_browser`. Missing arrays yield an empty series.
    pub fn dimension_series(&self, dimension: FilterDimension, metric: Metric) -> Vec<SeriesPoint> {
        self.series(
            &format!("{}_by_{}", metric.field(), dimension.field()),
            dimension.field(),
            metric.field(),
        )
    }

    /// The time-axis series for one metric (`clicks_by_time` etc.).
    pub fn time_series(&self, metric: Metric) -> Vec<SeriesPoint> {
        self.series(
            &format!("{}_by_time", metric.field()),
            "time",
            metric.field(),
        )
    }

    fn series(&self, key: &str, label_field: &str, value_field: &str) -> Vec<SeriesPoint> {
        let Some(rows) = self.metrics.get(key) else {
            return Vec::new();
        };

        rows.iter()
            .filter_map(|row| {
                let label = label_of(row.get(label_field)?)?;
                // A missing or non-numeric count still counts as a data
                // point, just with value 0.
                let value = row.get(value_field).and_then(Value::as_u64).unwrap_or(0);
                Some(SeriesPoint { label, value })
            })
            .collect()
    }
}

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StatsResponse {
        serde_json::from_value(json!({
            "summary": { "clicks": 120, "unique_clicks": 80, "links": 3 },
            "metrics": {
                "clicks_by_browser": [
                    { "browser": "Chrome", "clicks": 70 },
                    { "browser": "Firefox", "clicks": 30 },
                    { "browser": "Safari" },
                ],
                "unique_clicks_by_browser": [
                    { "browser": "Chrome", "unique_clicks": 50 },
                ],
                "clicks_by_time": [
                    { "time": "2024-06-15T10:00:00Z", "clicks": 60 },
                    { "time": "2024-06-15T11:00:00Z", "clicks": 60 },
                ],
            },
            "time_bucket_info": { "strategy": "hour" }
        }))
        .unwrap()
    }

    #[test]
    fn test_dimension_series_extraction() {
        let response = sample();
        let series = response.dimension_series(FilterDimension::Browser, Metric::Clicks);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0], SeriesPoint::new("Chrome", 70));
        // Missing count decodes as 0.
        assert_eq!(series[2], SeriesPoint::new("Safari", 0));
    }

    #[test]
    fn test_missing_series_is_empty() {
        let response = sample();
        assert!(response
            .dimension_series(FilterDimension::Country, Metric::Clicks)
            .is_empty());
        assert!(response.time_series(Metric::UniqueClicks).is_empty());
    }

    #[test]
    fn test_time_series_extraction() {
        let response = sample();
        let series = response.time_series(Metric::Clicks);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "2024-06-15T10:00:00Z");
    }

    #[test]
    fn test_summary_defaults_tolerate_sparse_payloads() {
        let response: StatsResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.summary, Summary::default());
        assert!(response.time_bucket_info.is_none());
    }
}
