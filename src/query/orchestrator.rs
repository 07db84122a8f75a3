//! Last-request-wins query orchestration
//!
//! At most one query result may ever reach the dashboard per "latest"
//! request. Each [`run`] claims a fresh generation before the network call
//! goes out, which invalidates every older request that is still in flight:
//! whenever a response (success or error) comes back for a generation that
//! is no longer current, it is dropped with zero side effects — not even
//! error reporting. This holds under arbitrary network reordering.
//!
//! [`run`]: QueryOrchestrator::run

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::query::{QueryApi, QueryRequest, QueryResult, StatsResponse};

/// Result of one orchestrated query.
#[derive(Debug)]
pub enum QueryOutcome {
    /// This was still the newest request when its response arrived. The
    /// generation must be re-checked against [`current_generation`] under
    /// the state lock before the response is committed: a newer request can
    /// start between this check and the commit.
    ///
    /// [`current_generation`]: QueryOrchestrator::current_generation
    Fresh {
        response: StatsResponse,
        generation: u64,
    },
    /// A newer request started while this one was in flight; the response
    /// was discarded unseen.
    Superseded,
}

pub struct QueryOrchestrator {
    api: Arc<dyn QueryApi>,
    generation: AtomicU64,
}

impl QueryOrchestrator {
    pub fn new(api: Arc<dyn QueryApi>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
        }
    }

    /// Issue one query. Starting a new run immediately supersedes any run
    /// still in flight.
    ///
    /// Errors are only surfaced for the newest request; a superseded request
    /// swallows its error and reports `Ok(Superseded)`.
    pub async fn run(&self, request: QueryRequest) -> QueryResult<QueryOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "issuing stats query");

        let result = self.api.query(&request).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "stats query superseded, dropping response");
            return Ok(QueryOutcome::Superseded);
        }

        match result {
            Ok(response) => Ok(QueryOutcome::Fresh {
                response,
                generation,
            }),
            Err(e) => {
                error!("stats query failed: {e}");
                Err(e)
            }
        }
    }

    /// The newest generation claimed so far. A fresh response may only be
    /// committed while its generation still equals this value, and the
    /// comparison must happen under the same lock that guards the commit.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
