//! Time range resolution
//!
//! Turns the dashboard's time selections into absolute UTC instants. Two
//! kinds of selection exist: relative presets from a fixed table ("last 7
//! days") and custom expressions typed by the user ("now-2h", "2024-01-01").
//! Custom expressions feed a bounded recency history so they can be picked
//! again later.
//!
//! All arithmetic is UTC; the engine never touches the local timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::prefs::PreferenceStore;

mod history;

pub use history::{HistoryEntry, RangeHistory, HISTORY_CAPACITY};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    /// A custom expression matched neither `now[-<n><unit>]` nor any of the
    /// supported date formats. Carries the offending token.
    #[error("invalid date format: '{0}'")]
    InvalidDateFormat(String),

    /// Both ends parsed but the range is empty or inverted.
    #[error("{0}")]
    InvalidRange(String),
}

/// Relative range presets offered by the dashboard.
///
/// The durations form a closed table; identifiers and durations must stay
/// stable because they appear in shared links and persisted preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeRange {
    Last30Minutes,
    LastHour,
    Last3Hours,
    Last6Hours,
    Last12Hours,
    Last24Hours,
    Last2Days,
    Last7Days,
    Last14Days,
    Last30Days,
    /// "Everything" is anchored 90 days back rather than at the epoch so the
    /// server never scans unbounded history.
    Everything,
}

impl RelativeRange {
    pub const ALL: [RelativeRange; 11] = [
        RelativeRange::Last30Minutes,
        RelativeRange::LastHour,
        RelativeRange::Last3Hours,
        RelativeRange::Last6Hours,
        RelativeRange::Last12Hours,
        RelativeRange::Last24Hours,
        RelativeRange::Last2Days,
        RelativeRange::Last7Days,
        RelativeRange::Last14Days,
        RelativeRange::Last30Days,
        RelativeRange::Everything,
    ];

    pub fn duration(self) -> Duration {
        match self {
            RelativeRange::Last30Minutes => Duration::minutes(30),
            RelativeRange::LastHour => Duration::hours(1),
            RelativeRange::Last3Hours => Duration::hours(3),
            RelativeRange::Last6Hours => Duration::hours(6),
            RelativeRange::Last12Hours => Duration::hours(12),
            RelativeRange::Last24Hours => Duration::hours(24),
            RelativeRange::Last2Days => Duration::days(2),
            RelativeRange::Last7Days => Duration::days(7),
            RelativeRange::Last14Days => Duration::days(14),
            RelativeRange::Last30Days => Duration::days(30),
            RelativeRange::Everything => Duration::days(90),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            RelativeRange::Last30Minutes => "last-30-minutes",
            RelativeRange::LastHour => "last-hour",
            RelativeRange::Last3Hours => "last-3-hours",
            RelativeRange::Last6Hours => "last-6-hours",
            RelativeRange::Last12Hours => "last-12-hours",
            RelativeRange::Last24Hours => "last-24-hours",
            RelativeRange::Last2Days => "last-2-days",
            RelativeRange::Last7Days => "last-7-days",
            RelativeRange::Last14Days => "last-14-days",
            RelativeRange::Last30Days => "last-30-days",
            RelativeRange::Everything => "everything",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            RelativeRange::Last30Minutes => "Last 30 minutes",
            RelativeRange::LastHour => "Last hour",
            RelativeRange::Last3Hours => "Last 3 hours",
            RelativeRange::Last6Hours => "Last 6 hours",
            RelativeRange::Last12Hours => "Last 12 hours",
            RelativeRange::Last24Hours => "Last 24 hours",
            RelativeRange::Last2Days => "Last 2 days",
            RelativeRange::Last7Days => "Last 7 days",
            RelativeRange::Last14Days => "Last 14 days",
            RelativeRange::Last30Days => "Last 30 days",
            RelativeRange::Everything => "Everything",
        }
    }
}

/// The user's current time selection, as chosen (not yet resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSelection {
    Relative(RelativeRange),
    Custom { from: String, to: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Relative(RelativeRange),
    Custom,
}

/// A resolved, absolute time range. Immutable once produced; superseded by
/// the next selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: RangeKind,
}

impl TimeRange {
    pub fn start_iso(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_iso(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Parse one side of a custom range expression.
///
/// Accepted forms, tried in order:
/// - the literal `now`
/// - `now-<integer><unit>` with unit `d`, `h` or `m`
/// - RFC 3339 (`2024-01-01T00:00:00Z`)
/// - `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DDTHH:MM[:SS]`, read as UTC
/// - bare `YYYY-MM-DD`, read as UTC midnight
pub fn parse_time_expr(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeRangeError> {
    let expr = expr.trim();

    if expr == "now" {
        return Ok(now);
    }

    if let Some(rest) = expr.strip_prefix("now-") {
        if let Some(instant) = parse_now_offset(rest, now) {
            return Ok(instant);
        }
        // A "now-..." that is not a valid offset still gets a shot at the
        // generic formats. If those fail too, the error names the unit
        // suffix that broke the offset, not the whole expression.
        if let Some(instant) = parse_absolute(expr) {
            return Ok(instant);
        }
        let unit = rest.trim_start_matches(|c: char| c.is_ascii_digit());
        let token = if unit.is_empty() { expr } else { unit };
        return Err(TimeRangeError::InvalidDateFormat(token.to_string()));
    }

    parse_absolute(expr).ok_or_else(|| TimeRangeError::InvalidDateFormat(expr.to_string()))
}

fn parse_now_offset(rest: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let unit = rest.chars().last()?;
    let amount: i64 = rest[..rest.len() - unit.len_utf8()].parse().ok()?;
    if amount < 0 {
        return None;
    }

    let duration = match unit {
        'd' => Duration::days(amount),
        'h' => Duration::hours(amount),
        'm' => Duration::minutes(amount),
        _ => return None,
    };

    Some(now - duration)
}

fn parse_absolute(expr: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(expr) {
        return Some(instant.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(expr, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

/// Resolve a selection against an explicit "now". The resolver proper calls
/// this with `Utc::now()`; tests inject a fixed instant.
pub fn resolve_at(
    selection: &RangeSelection,
    now: DateTime<Utc>,
) -> Result<TimeRange, TimeRangeError> {
    match selection {
        RangeSelection::Relative(range) => Ok(TimeRange {
            start: now - range.duration(),
            end: now,
            kind: RangeKind::Relative(*range),
        }),
        RangeSelection::Custom { from, to } => {
            let start = parse_time_expr(from, now)?;
            let end = parse_time_expr(to, now)?;
            if start >= end {
                return Err(TimeRangeError::InvalidRange(
                    "From date must be before To date".to_string(),
                ));
            }
            Ok(TimeRange {
                start,
                end,
                kind: RangeKind::Custom,
            })
        }
    }
}

/// Holds the current selection and the custom-range recency history.
///
/// Relative selections re-anchor to "now" every time [`resolve`] is called,
/// which is what makes auto-reload show a moving window. Custom selections
/// are validated when applied and resolve to the same instants afterwards
/// (modulo `now`-relative expressions, which also re-anchor).
///
/// [`resolve`]: TimeRangeResolver::resolve
pub struct TimeRangeResolver {
    selection: RangeSelection,
    history: RangeHistory,
}

impl TimeRangeResolver {
    /// Default selection: last 24 hours.
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            selection: RangeSelection::Relative(RelativeRange::Last24Hours),
            history: RangeHistory::load(prefs),
        }
    }

    pub fn selection(&self) -> &RangeSelection {
        &self.selection
    }

    /// Resolve the current selection against the current instant.
    pub fn resolve(&self) -> Result<TimeRange, TimeRangeError> {
        resolve_at(&self.selection, Utc::now())
    }

    pub fn apply_relative(&mut self, range: RelativeRange) -> TimeRange {
        self.selection = RangeSelection::Relative(range);
        // Relative presets always resolve.
        let now = Utc::now();
        TimeRange {
            start: now - range.duration(),
            end: now,
            kind: RangeKind::Relative(range),
        }
    }

    /// Validate and apply a custom range. On success the pair is recorded in
    /// the recency history; on failure the current selection is untouched.
    pub fn apply_custom(&mut self, from: &str, to: &str) -> Result<TimeRange, TimeRangeError> {
        let from = from.trim().to_string();
        let to = to.trim().to_string();
        let selection = RangeSelection::Custom {
            from: from.clone(),
            to: to.clone(),
        };
        let range = resolve_at(&selection, Utc::now())?;

        self.selection = selection;
        self.history.record(&from, &to, format!("{from} to {to}"));
        Ok(range)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferenceStore;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_table_is_exact() {
        let now = fixed_now();
        let cases = [
            (RelativeRange::Last30Minutes, Duration::minutes(30)),
            (RelativeRange::LastHour, Duration::hours(1)),
            (RelativeRange::Last3Hours, Duration::hours(3)),
            (RelativeRange::Last6Hours, Duration::hours(6)),
            (RelativeRange::Last12Hours, Duration::hours(12)),
            (RelativeRange::Last24Hours, Duration::hours(24)),
            (RelativeRange::Last2Days, Duration::days(2)),
            (RelativeRange::Last7Days, Duration::days(7)),
            (RelativeRange::Last14Days, Duration::days(14)),
            (RelativeRange::Last30Days, Duration::days(30)),
            (RelativeRange::Everything, Duration::days(90)),
        ];

        for (range, duration) in cases {
            let resolved = resolve_at(&RangeSelection::Relative(range), now).unwrap();
            assert_eq!(resolved.end, now, "{:?}", range);
            assert_eq!(resolved.start, now - duration, "{:?}", range);
        }
    }

    #[test]
    fn test_range_ids_roundtrip() {
        for range in RelativeRange::ALL {
            assert_eq!(RelativeRange::from_id(range.id()), Some(range));
        }
        assert_eq!(RelativeRange::from_id("last-7-days"), Some(RelativeRange::Last7Days));
        assert_eq!(RelativeRange::from_id("bogus"), None);
    }

    #[test]
    fn test_parse_now_literal() {
        let now = fixed_now();
        assert_eq!(parse_time_expr("now", now).unwrap(), now);
        assert_eq!(parse_time_expr("  now ", now).unwrap(), now);
    }

    #[test]
    fn test_parse_now_offsets_to_the_second() {
        let now = fixed_now();
        assert_eq!(parse_time_expr("now-2h", now).unwrap(), now - Duration::hours(2));
        assert_eq!(parse_time_expr("now-7d", now).unwrap(), now - Duration::days(7));
        assert_eq!(parse_time_expr("now-45m", now).unwrap(), now - Duration::minutes(45));
        assert_eq!(parse_time_expr("now-0m", now).unwrap(), now);
    }

    #[test]
    fn test_parse_absolute_formats() {
        let now = fixed_now();
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(parse_time_expr("2024-01-02T03:04:05Z", now).unwrap(), expected);
        assert_eq!(parse_time_expr("2024-01-02 03:04:05", now).unwrap(), expected);
        assert_eq!(parse_time_expr("2024-01-02T03:04:05", now).unwrap(), expected);
        assert_eq!(
            parse_time_expr("2024-01-02 03:04", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap()
        );
        assert_eq!(
            parse_time_expr("2024-01-02", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage_with_token() {
        let now = fixed_now();
        // Broken offsets report the unit suffix, not the full expression.
        match parse_time_expr("now-5x", now) {
            Err(TimeRangeError::InvalidDateFormat(token)) => assert_eq!(token, "x"),
            other => panic!("expected InvalidDateFormat, got {:?}", other),
        }
        match parse_time_expr("now-h", now) {
            Err(TimeRangeError::InvalidDateFormat(token)) => assert_eq!(token, "h"),
            other => panic!("expected InvalidDateFormat, got {:?}", other),
        }
        // A missing unit falls back to the whole expression.
        match parse_time_expr("now-5", now) {
            Err(TimeRangeError::InvalidDateFormat(token)) => assert_eq!(token, "now-5"),
            other => panic!("expected InvalidDateFormat, got {:?}", other),
        }
        match parse_time_expr("yesterday", now) {
            Err(TimeRangeError::InvalidDateFormat(token)) => assert_eq!(token, "yesterday"),
            other => panic!("expected InvalidDateFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_range_must_be_strictly_ordered() {
        let now = fixed_now();

        let equal = RangeSelection::Custom {
            from: "2024-01-01".to_string(),
            to: "2024-01-01".to_string(),
        };
        match resolve_at(&equal, now) {
            Err(TimeRangeError::InvalidRange(msg)) => {
                assert_eq!(msg, "From date must be before To date");
            }
            other => panic!("expected InvalidRange, got {:?}", other),
        }

        let inverted = RangeSelection::Custom {
            from: "now".to_string(),
            to: "now-1h".to_string(),
        };
        assert!(matches!(resolve_at(&inverted, now), Err(TimeRangeError::InvalidRange(_))));
    }

    #[test]
    fn test_apply_custom_failure_keeps_selection() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let mut resolver = TimeRangeResolver::new(prefs);
        let before = resolver.selection().clone();

        assert!(resolver.apply_custom("garbage", "now").is_err());
        assert_eq!(resolver.selection(), &before);
    }

    #[test]
    fn test_apply_custom_records_history() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let mut resolver = TimeRangeResolver::new(prefs);

        resolver.apply_custom("now-2h", "now").unwrap();
        let first = resolver.history()[0].clone();
        assert_eq!(first.from, "now-2h");
        assert_eq!(first.to, "now");
    }
}
