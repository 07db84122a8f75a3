//! Query transport
//!
//! The engine talks to the aggregation API through the [`QueryApi`] trait;
//! [`HttpQueryApi`] is the reqwest-backed implementation the binary uses,
//! tests substitute scripted implementations.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::query::{QueryRequest, StatsResponse};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("stats request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stats API returned HTTP {status}")]
    Status { status: u16 },

    #[error("could not decode stats response: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;

#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> QueryResult<StatsResponse>;
}

/// `GET /stats` over HTTP, with an optional bearer token.
pub struct HttpQueryApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpQueryApi {
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api.base_url.clone(),
            bearer_token: config.api.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl QueryApi for HttpQueryApi {
    async fn query(&self, request: &QueryRequest) -> QueryResult<StatsResponse> {
        let mut builder = self
            .client
            .get(&self.base_url)
            .query(&request.query_pairs());

        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(QueryError::Decode)
    }
}
