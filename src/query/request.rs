//! Query parameter assembly
//!
//! A request is fully determined by the resolved time range and the
//! committed filter selection; there are no hidden inputs.

use crate::filters::{FilterDimension, FilterSelection};
use crate::query::Metric;
use crate::timerange::TimeRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub start_iso: String,
    pub end_iso: String,
    /// Dimension fields plus `time`.
    pub group_by: Vec<String>,
    pub metrics: Vec<Metric>,
    pub filters: FilterSelection,
}

impl QueryRequest {
    /// Build the standard dashboard request: group by every dimension and
    /// the time axis, fetch both metrics, apply the committed filters.
    pub fn from_state(range: &TimeRange, filters: FilterSelection) -> Self {
        let mut group_by: Vec<String> = FilterDimension::ALL
            .iter()
            .map(|d| d.field().to_string())
            .collect();
        group_by.push("time".to_string());

        Self {
            start_iso: range.start_iso(),
            end_iso: range.end_iso(),
            group_by,
            metrics: Metric::ALL.to_vec(),
            filters,
        }
    }

    /// Flatten into URL query pairs for `GET /stats`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("start_date".to_string(), self.start_iso.clone()),
            ("end_date".to_string(), self.end_iso.clone()),
            ("group_by".to_string(), self.group_by.join(",")),
            (
                "metrics".to_string(),
                self.metrics
                    .iter()
                    .map(|m| m.field())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        ];

        for (dimension, values) in &self.filters {
            if values.is_empty() {
                continue;
            }
            pairs.push((
                dimension.field().to_string(),
                values.iter().cloned().collect::<Vec<_>>().join(","),
            ));
        }

        pairs
    }
}
