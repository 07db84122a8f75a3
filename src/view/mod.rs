//! Per-dimension view state
//!
//! Each dimension's panel is either an aggregate chart (bucketed top-N
//! series) or a full table. The controller only decides which derived
//! computation feeds the renderer next; the swap animation is the
//! renderer's business. The toggle is reentrant and lives for the session.

use std::collections::BTreeMap;

use crate::filters::FilterDimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Aggregate,
    Tabular,
}

/// Which metric an aggregate chart plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricMode {
    #[default]
    Total,
    Unique,
    /// Total and unique side by side.
    Compare,
}

#[derive(Default)]
pub struct ViewStateController {
    views: BTreeMap<FilterDimension, ViewMode>,
    metric_modes: BTreeMap<FilterDimension, MetricMode>,
}

impl ViewStateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self, dimension: FilterDimension) -> ViewMode {
        self.views.get(&dimension).copied().unwrap_or_default()
    }

    pub fn toggle_view(&mut self, dimension: FilterDimension) -> ViewMode {
        let next = match self.view(dimension) {
            ViewMode::Aggregate => ViewMode::Tabular,
            ViewMode::Tabular => ViewMode::Aggregate,
        };
        self.views.insert(dimension, next);
        next
    }

    pub fn metric_mode(&self, dimension: FilterDimension) -> MetricMode {
        self.metric_modes.get(&dimension).copied().unwrap_or_default()
    }

    /// The table always shows all rows with both counts, so the metric
    /// selector is dead while a dimension is tabular.
    pub fn metric_selector_enabled(&self, dimension: FilterDimension) -> bool {
        self.view(dimension) == ViewMode::Aggregate
    }

    /// Returns whether the change was applied; refused while tabular.
    pub fn set_metric_mode(&mut self, dimension: FilterDimension, mode: MetricMode) -> bool {
        if !self.metric_selector_enabled(dimension) {
            return false;
        }
        self.metric_modes.insert(dimension, mode);
        true
    }
}
