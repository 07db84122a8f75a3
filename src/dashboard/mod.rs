//! Dashboard coordination
//!
//! Wires user input to the filter store and time range resolver, funnels
//! every data refresh through one `reload` path, and hands derived series
//! to the renderer. Committed filter changes arrive over the store's single
//! change listener as messages on a channel; the controller's listener task
//! turns each one into a reload. The auto-reload timer and manual reloads
//! share the same entry point, so an overlap costs at most one wasted
//! network call that supersession then neutralizes.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::filters::{FilterDimension, FilterOption, FilterSelection, FilterStore};
use crate::prefs::PreferenceStore;
use crate::query::{
    Metric, QueryApi, QueryOrchestrator, QueryOutcome, QueryRequest, StatsResponse, Summary,
};
use crate::series::{bucket_top_n, is_others, table_rows, SeriesPoint, TableRow, TOP_N};
use crate::timerange::{HistoryEntry, RelativeRange, TimeRangeError, TimeRangeResolver};
use crate::view::{MetricMode, ViewMode, ViewStateController};

const AUTO_RELOAD_KEY: &str = "clickdash.auto_reload_secs";

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Range(#[from] TimeRangeError),

    /// Recoverable: the previous dataset stays on screen, a fresh reload is
    /// the only retry.
    #[error(transparent)]
    Query(#[from] crate::query::QueryError),
}

/// What a render call is for: one dimension panel or the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Dimension(FilterDimension),
    Time,
}

/// The derived data handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPayload {
    /// Bucketed top-N series (aggregate view).
    Series(Vec<SeriesPoint>),
    /// Both metrics bucketed, for compare mode and the time axis.
    Compare {
        total: Vec<SeriesPoint>,
        unique: Vec<SeriesPoint>,
    },
    /// Full unbucketed rows (tabular view).
    Table(Vec<TableRow>),
}

/// External renderer. Everything pixel-shaped happens behind this trait;
/// the engine never looks back at rendering state.
pub trait Renderer: Send + Sync {
    fn render(&self, target: RenderTarget, mode: MetricMode, payload: RenderPayload);
    fn render_summary(&self, summary: &Summary);
}

struct DashboardState {
    resolver: TimeRangeResolver,
    filters: FilterStore,
    views: ViewStateController,
    latest: Option<StatsResponse>,
}

/// Top-level coordinator, one instance per session.
pub struct DashboardController {
    state: Mutex<DashboardState>,
    orchestrator: QueryOrchestrator,
    renderer: Arc<dyn Renderer>,
    prefs: Arc<dyn PreferenceStore>,
    changes: std::sync::Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    auto_reload: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardController {
    pub fn new(
        api: Arc<dyn QueryApi>,
        renderer: Arc<dyn Renderer>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut filters = FilterStore::new();
        filters.set_on_change(move || {
            // Queue the commit; the listener task reloads.
            let _ = tx.send(());
        });

        Arc::new(Self {
            state: Mutex::new(DashboardState {
                resolver: TimeRangeResolver::new(Arc::clone(&prefs)),
                filters,
                views: ViewStateController::new(),
                latest: None,
            }),
            orchestrator: QueryOrchestrator::new(api),
            renderer,
            prefs,
            changes: std::sync::Mutex::new(Some(rx)),
            auto_reload: Mutex::new(None),
        })
    }

    /// Spawn the listener that turns committed filter changes into reloads.
    /// Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let receiver = match self.changes.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(mut receiver) = receiver else {
            return;
        };

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while receiver.recv().await.is_some() {
                if let Err(e) = controller.reload().await {
                    error!("reload after filter change failed: {e}");
                }
            }
        });
    }

    /// Query with the current range and filters and render the result.
    ///
    /// Returns `Ok(false)` when a newer reload superseded this one (nothing
    /// happened, by design). A query error leaves all state untouched; the
    /// caller surfaces it as a notification and the previous dataset stays.
    pub async fn reload(&self) -> Result<bool, DashboardError> {
        let request = {
            let state = self.state.lock().await;
            let range = state.resolver.resolve()?;
            QueryRequest::from_state(&range, state.filters.snapshot())
        };

        match self.orchestrator.run(request).await? {
            QueryOutcome::Superseded => Ok(false),
            QueryOutcome::Fresh {
                response,
                generation,
            } => {
                let mut state = self.state.lock().await;
                // Re-check under the state lock. A newer reload can claim its
                // generation between the orchestrator's check and this lock
                // acquisition; committing here would let stale data overwrite
                // the newer commit.
                if self.orchestrator.current_generation() != generation {
                    debug!(generation, "stats query superseded before commit, dropping response");
                    return Ok(false);
                }
                state.filters.populate_options(&response);
                state.latest = Some(response);
                Self::render_all(&state, self.renderer.as_ref());
                Ok(true)
            }
        }
    }

    /// Apply a relative preset and reload.
    pub async fn apply_relative_range(&self, range: RelativeRange) -> Result<bool, DashboardError> {
        {
            let mut state = self.state.lock().await;
            state.resolver.apply_relative(range);
        }
        info!(range = range.id(), "time range changed");
        self.reload().await
    }

    /// Validate and apply a custom range, then reload. Parse and ordering
    /// errors surface synchronously and change nothing.
    pub async fn apply_custom_range(&self, from: &str, to: &str) -> Result<bool, DashboardError> {
        {
            let mut state = self.state.lock().await;
            state.resolver.apply_custom(from, to)?;
        }
        info!(from, to, "custom time range applied");
        self.reload().await
    }

    pub async fn begin_filter_edit(&self, dimension: FilterDimension) {
        self.state.lock().await.filters.begin_edit(dimension);
    }

    /// Stage one value while its dimension is under edit (or apply silently
    /// when it is not). No reload until commit.
    pub async fn add_filter(&self, dimension: FilterDimension, value: &str) {
        self.state.lock().await.filters.add(dimension, value);
    }

    pub async fn remove_filter(&self, dimension: FilterDimension, value: &str) {
        self.state.lock().await.filters.remove(dimension, value);
    }

    /// Commit a dimension's staged edits; the change notification drives the
    /// reload through the listener task.
    pub async fn commit_filter_edit(&self, dimension: FilterDimension) {
        self.state.lock().await.filters.commit_edit(dimension);
    }

    pub async fn discard_filter_edit(&self, dimension: FilterDimension) {
        self.state.lock().await.filters.discard_edit(dimension);
    }

    /// Instant clear-all.
    pub async fn clear_filters(&self) {
        self.state.lock().await.filters.clear_all();
    }

    /// Chart click-to-filter. The "Others" bucket is a sentinel and clicking
    /// it does nothing at all.
    pub async fn chart_click(&self, dimension: FilterDimension, label: &str) {
        if is_others(label) {
            debug!(dimension = dimension.field(), "ignoring click on overflow bucket");
            return;
        }
        self.state.lock().await.filters.toggle(dimension, label);
    }

    /// Flip a dimension between aggregate and tabular view and re-render it
    /// from the latest response. No network traffic.
    pub async fn toggle_view(&self, dimension: FilterDimension) -> ViewMode {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mode = state.views.toggle_view(dimension);
        debug!(dimension = dimension.field(), ?mode, "view toggled");

        if let Some(response) = &state.latest {
            let payload = Self::derive_payload(&state.views, response, dimension);
            self.renderer.render(
                RenderTarget::Dimension(dimension),
                state.views.metric_mode(dimension),
                payload,
            );
        }
        mode
    }

    /// Switch a dimension's aggregate chart between total, unique and
    /// compare. Ignored while the dimension is tabular.
    pub async fn set_metric_mode(&self, dimension: FilterDimension, mode: MetricMode) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if !state.views.set_metric_mode(dimension, mode) {
            debug!(dimension = dimension.field(), "metric selector disabled in tabular view");
            return;
        }

        if let Some(response) = &state.latest {
            let payload = Self::derive_payload(&state.views, response, dimension);
            self.renderer
                .render(RenderTarget::Dimension(dimension), mode, payload);
        }
    }

    /// Set (or disable) the auto-reload interval and persist the choice.
    /// Starting a new interval always cancels the previous one.
    pub async fn set_auto_reload(self: &Arc<Self>, every: Option<Duration>) {
        let value = match every {
            Some(d) => d.as_secs().to_string(),
            None => "off".to_string(),
        };
        self.prefs.set(AUTO_RELOAD_KEY, &value);
        self.apply_auto_reload(every).await;
    }

    /// Restore the persisted auto-reload preference, ignoring unreadable
    /// values.
    pub async fn resume_auto_reload(self: &Arc<Self>) {
        let every = self.prefs.get(AUTO_RELOAD_KEY).and_then(|raw| {
            if raw == "off" {
                return None;
            }
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    warn!("ignoring unreadable auto-reload preference '{raw}'");
                    None
                }
            }
        });
        self.apply_auto_reload(every).await;
    }

    async fn apply_auto_reload(self: &Arc<Self>, every: Option<Duration>) {
        let mut slot = self.auto_reload.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let Some(every) = every else {
            info!("auto-reload disabled");
            return;
        };

        info!(secs = every.as_secs(), "auto-reload enabled");
        let controller = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // Skip the first tick which fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = controller.reload().await {
                    error!("auto-reload query failed: {e}");
                }
            }
        }));
    }

    fn render_all(state: &DashboardState, renderer: &dyn Renderer) {
        let Some(response) = &state.latest else {
            return;
        };

        renderer.render_summary(&response.summary);

        for dimension in FilterDimension::ALL {
            let payload = Self::derive_payload(&state.views, response, dimension);
            renderer.render(
                RenderTarget::Dimension(dimension),
                state.views.metric_mode(dimension),
                payload,
            );
        }

        // The time axis is never bucketed or tabular; both metrics go out
        // and the renderer picks what to draw.
        renderer.render(
            RenderTarget::Time,
            MetricMode::Compare,
            RenderPayload::Compare {
                total: response.time_series(Metric::Clicks),
                unique: response.time_series(Metric::UniqueClicks),
            },
        );
    }

    fn derive_payload(
        views: &ViewStateController,
        response: &StatsResponse,
        dimension: FilterDimension,
    ) -> RenderPayload {
        match views.view(dimension) {
            ViewMode::Tabular => RenderPayload::Table(table_rows(
                &response.dimension_series(dimension, Metric::Clicks),
                &response.dimension_series(dimension, Metric::UniqueClicks),
            )),
            ViewMode::Aggregate => match views.metric_mode(dimension) {
                MetricMode::Total => RenderPayload::Series(bucket_top_n(
                    &response.dimension_series(dimension, Metric::Clicks),
                    TOP_N,
                )),
                MetricMode::Unique => RenderPayload::Series(bucket_top_n(
                    &response.dimension_series(dimension, Metric::UniqueClicks),
                    TOP_N,
                )),
                MetricMode::Compare => RenderPayload::Compare {
                    total: bucket_top_n(
                        &response.dimension_series(dimension, Metric::Clicks),
                        TOP_N,
                    ),
                    unique: bucket_top_n(
                        &response.dimension_series(dimension, Metric::UniqueClicks),
                        TOP_N,
                    ),
                },
            },
        }
    }

    // Read accessors for the CLI and tests.

    pub async fn filter_snapshot(&self) -> FilterSelection {
        self.state.lock().await.filters.snapshot()
    }

    pub async fn filter_options(&self, dimension: FilterDimension) -> Vec<FilterOption> {
        self.state.lock().await.filters.options(dimension).to_vec()
    }

    pub async fn range_history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.resolver.history().to_vec()
    }

    pub async fn latest_summary(&self) -> Option<Summary> {
        self.state
            .lock()
            .await
            .latest
            .as_ref()
            .map(|r| r.summary.clone())
    }
}
