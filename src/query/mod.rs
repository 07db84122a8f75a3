//! Query layer: wire models, request building, transport and orchestration

mod client;
mod models;
mod orchestrator;
mod request;

pub use client::{HttpQueryApi, QueryApi, QueryError, QueryResult};
pub use models::{Metric, StatsResponse, Summary, TimeBucketInfo};
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use request::QueryRequest;
