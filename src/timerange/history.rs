//! Bounded recency history for custom time ranges
//!
//! Every applied custom range is remembered so the picker can offer it
//! again. The list is most-recent-first, deduplicated by `(from, to)` and
//! capped at [`HISTORY_CAPACITY`] entries. It lives in the external
//! preference store; a missing or corrupt value falls back to a seed list
//! and never produces an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::prefs::PreferenceStore;

pub const HISTORY_CAPACITY: usize = 10;

const HISTORY_KEY: &str = "clickdash.timerange.history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: String,
    pub to: String,
    pub display: String,
    pub created_at: DateTime<Utc>,
}

pub struct RangeHistory {
    prefs: Arc<dyn PreferenceStore>,
    entries: Vec<HistoryEntry>,
}

impl RangeHistory {
    /// Load persisted history, falling back to the seed list when the store
    /// has nothing usable.
    pub fn load(prefs: Arc<dyn PreferenceStore>) -> Self {
        let entries = match prefs.get(HISTORY_KEY) {
            Some(raw) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(entries) if !entries.is_empty() => entries,
                Ok(_) => seed_entries(),
                Err(e) => {
                    warn!("discarding corrupt time range history: {e}");
                    seed_entries()
                }
            },
            None => seed_entries(),
        };

        Self { prefs, entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Record one applied custom range: drop any existing entry for the same
    /// pair, prepend, truncate, persist.
    pub fn record(&mut self, from: &str, to: &str, display: String) {
        self.entries.retain(|e| !(e.from == from && e.to == to));
        self.entries.insert(
            0,
            HistoryEntry {
                from: from.to_string(),
                to: to.to_string(),
                display,
                created_at: Utc::now(),
            },
        );
        self.entries.truncate(HISTORY_CAPACITY);
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_string(&self.entries) {
            Ok(raw) => self.prefs.set(HISTORY_KEY, &raw),
            Err(e) => warn!("failed to serialize time range history: {e}"),
        }
    }
}

/// Illustrative ranges shown before the user has any history of their own.
fn seed_entries() -> Vec<HistoryEntry> {
    let seeds: [(&str, &str, &str); 7] = [
        ("now-30m", "now", "Last 30 minutes"),
        ("now-1h", "now", "Last hour"),
        ("now-6h", "now", "Last 6 hours"),
        ("now-24h", "now", "Last 24 hours"),
        ("now-7d", "now", "Last 7 days"),
        ("now-30d", "now", "Last 30 days"),
        ("2024-01-01", "now", "Since 2024"),
    ];

    let created_at = Utc::now();
    seeds
        .into_iter()
        .map(|(from, to, display)| HistoryEntry {
            from: from.to_string(),
            to: to.to_string(),
            display: display.to_string(),
            created_at,
        })
        .collect()
}
