//! Filter state
//!
//! Active filter values per dimension, plus the option catalog (the values a
//! dimension can currently be filtered by, with counts) derived from the
//! latest query response.
//!
//! Mutations come in two speeds. Checkbox-style editing in the filter picker
//! is staged: `begin_edit` opens a dimension, `add`/`remove` hit a staged
//! copy, and only `commit_edit` applies the batch and notifies — one network
//! round-trip per visit to the picker instead of one per click. Single-click
//! interactions (chart click-to-filter, clear-all) skip staging and notify
//! immediately.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::query::StatsResponse;

mod country;

pub use country::country_name;

/// Categorical facets of the click data. Closed set, known at compile time.
///
/// Device is deliberately absent: client-side device detection is not
/// reliable enough yet to filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterDimension {
    Browser,
    Os,
    Country,
    City,
    Referrer,
    Key,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 6] = [
        FilterDimension::Browser,
        FilterDimension::Os,
        FilterDimension::Country,
        FilterDimension::City,
        FilterDimension::Referrer,
        FilterDimension::Key,
    ];

    /// Field name as it appears in query parameters and response keys.
    pub fn field(self) -> &'static str {
        match self {
            FilterDimension::Browser => "browser",
            FilterDimension::Os => "os",
            FilterDimension::Country => "country",
            FilterDimension::City => "city",
            FilterDimension::Referrer => "referrer",
            FilterDimension::Key => "key",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.field() == field)
    }

    pub fn title(self) -> &'static str {
        match self {
            FilterDimension::Browser => "Browser",
            FilterDimension::Os => "OS",
            FilterDimension::Country => "Country",
            FilterDimension::City => "City",
            FilterDimension::Referrer => "Referrer",
            FilterDimension::Key => "Short code",
        }
    }
}

/// Active filter values per dimension. Values are unique per dimension by
/// construction; dimensions without values carry no entry.
pub type FilterSelection = BTreeMap<FilterDimension, BTreeSet<String>>;

/// One selectable value of a dimension, with its count from the latest
/// response. Country codes get a translated display label; everything else
/// shows the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub count: u64,
}

type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// In-memory filter state. Mutation and read operations never fail; they
/// are no-ops when there is nothing to do.
#[derive(Default)]
pub struct FilterStore {
    live: FilterSelection,
    staged: BTreeMap<FilterDimension, BTreeSet<String>>,
    pending: BTreeSet<FilterDimension>,
    options: BTreeMap<FilterDimension, Vec<FilterOption>>,
    listener: Option<ChangeListener>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single change listener, called at most once per commit.
    ///
    /// The store supports exactly one subscriber; registering again replaces
    /// the previous listener (a caller configuration error, not fan-out).
    pub fn set_on_change(&mut self, listener: impl Fn() + Send + Sync + 'static) {
        if self.listener.is_some() {
            warn!("replacing existing filter change listener; only one subscriber is supported");
        }
        self.listener = Some(Box::new(listener));
    }

    fn notify(&self) {
        match &self.listener {
            Some(listener) => listener(),
            None => debug!("filter change committed with no listener registered"),
        }
    }

    /// Open a dimension for staged editing. Already-pending dimensions keep
    /// their staged state.
    pub fn begin_edit(&mut self, dimension: FilterDimension) {
        if self.pending.insert(dimension) {
            let current = self.live.get(&dimension).cloned().unwrap_or_default();
            self.staged.insert(dimension, current);
        }
    }

    /// Insert a value. Staged while the dimension is under edit, otherwise
    /// applied directly (without notification — direct writes that should
    /// reload go through [`toggle`](Self::toggle) or a commit).
    pub fn add(&mut self, dimension: FilterDimension, value: &str) {
        self.target_set(dimension).insert(value.to_string());
    }

    /// Remove a value; no-op when absent.
    pub fn remove(&mut self, dimension: FilterDimension, value: &str) {
        self.target_set(dimension).remove(value);
        self.prune(dimension);
    }

    fn target_set(&mut self, dimension: FilterDimension) -> &mut BTreeSet<String> {
        if self.pending.contains(&dimension) {
            self.staged.entry(dimension).or_default()
        } else {
            self.live.entry(dimension).or_default()
        }
    }

    /// Drop empty sets so `snapshot` never carries hollow dimensions.
    fn prune(&mut self, dimension: FilterDimension) {
        if self.live.get(&dimension).is_some_and(BTreeSet::is_empty) {
            self.live.remove(&dimension);
        }
        if !self.pending.contains(&dimension)
            && self.staged.get(&dimension).is_some_and(BTreeSet::is_empty)
        {
            self.staged.remove(&dimension);
        }
    }

    /// Apply a dimension's staged edits atomically. Emits one change
    /// notification, and none at all when the commit changes nothing.
    pub fn commit_edit(&mut self, dimension: FilterDimension) {
        if !self.pending.remove(&dimension) {
            return;
        }
        let staged = self.staged.remove(&dimension).unwrap_or_default();
        let before = self.live.get(&dimension).cloned().unwrap_or_default();

        if staged == before {
            return;
        }

        if staged.is_empty() {
            self.live.remove(&dimension);
        } else {
            self.live.insert(dimension, staged);
        }
        self.notify();
    }

    /// Throw away a dimension's staged edits.
    pub fn discard_edit(&mut self, dimension: FilterDimension) {
        self.pending.remove(&dimension);
        self.staged.remove(&dimension);
    }

    pub fn is_editing(&self, dimension: FilterDimension) -> bool {
        self.pending.contains(&dimension)
    }

    /// Flip one value directly, bypassing staging. This is the chart
    /// click-to-filter path; it notifies immediately.
    pub fn toggle(&mut self, dimension: FilterDimension, value: &str) {
        let set = self.live.entry(dimension).or_default();
        if !set.remove(value) {
            set.insert(value.to_string());
        }
        self.prune(dimension);
        self.notify();
    }

    /// Clear one dimension's committed values. Notifies when anything was
    /// cleared.
    pub fn clear(&mut self, dimension: FilterDimension) {
        if self.live.remove(&dimension).is_some() {
            self.notify();
        }
    }

    /// Clear everything, staged edits included. Instant action: notifies
    /// immediately when any committed value was dropped.
    pub fn clear_all(&mut self) {
        self.staged.clear();
        self.pending.clear();
        if self.live.is_empty() {
            return;
        }
        self.live.clear();
        self.notify();
    }

    /// Reflects the staged state while a dimension is under edit, so the
    /// picker checkboxes track in-progress clicks.
    pub fn is_selected(&self, dimension: FilterDimension, value: &str) -> bool {
        let set = if self.pending.contains(&dimension) {
            self.staged.get(&dimension)
        } else {
            self.live.get(&dimension)
        };
        set.is_some_and(|s| s.contains(value))
    }

    /// Defensive copy of the committed selection; staged edits are invisible
    /// here until committed.
    pub fn snapshot(&self) -> FilterSelection {
        self.live.clone()
    }

    pub fn total_active_count(&self) -> usize {
        self.live.values().map(BTreeSet::len).sum()
    }

    pub fn options(&self, dimension: FilterDimension) -> &[FilterOption] {
        self.options.get(&dimension).map_or(&[], Vec::as_slice)
    }

    /// Rebuild every dimension's option catalog from a fresh response.
    ///
    /// Replaces the lists wholesale — options never merge across queries.
    /// Empty values are dropped; country codes are translated through the
    /// static ISO table (unmapped codes pass through); each list is sorted
    /// by count descending.
    pub fn populate_options(&mut self, response: &StatsResponse) {
        for dimension in FilterDimension::ALL {
            let mut list: Vec<FilterOption> = response
                .dimension_series(dimension, crate::query::Metric::Clicks)
                .into_iter()
                .filter(|point| !point.label.is_empty())
                .map(|point| {
                    let label = match dimension {
                        FilterDimension::Country => country_name(&point.label)
                            .map(str::to_string)
                            .unwrap_or_else(|| point.label.clone()),
                        _ => point.label.clone(),
                    };
                    FilterOption {
                        value: point.label,
                        label,
                        count: point.value,
                    }
                })
                .collect();

            list.sort_by(|a, b| b.count.cmp(&a.count));
            debug!(dimension = dimension.field(), options = list.len(), "option catalog rebuilt");
            self.options.insert(dimension, list);
        }
    }
}
