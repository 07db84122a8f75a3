use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api: ApiConfig,
    /// Where dashboard preferences (range history, auto-reload interval)
    /// are persisted between runs.
    pub prefs_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the stats endpoint.
    pub base_url: String,
    /// Optional bearer token; the aggregation API may sit behind OAuth.
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("STATS_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/api/stats".to_string());

        let bearer_token = std::env::var("STATS_API_TOKEN").ok();

        let timeout_secs = std::env::var("STATS_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("STATS_TIMEOUT_SECS must be an integer number of seconds")?;

        let prefs_path = std::env::var("CLICKDASH_PREFS_PATH")
            .unwrap_or_else(|_| "clickdash-prefs.json".to_string());

        Ok(EngineConfig {
            api: ApiConfig {
                base_url,
                bearer_token,
                timeout_secs,
            },
            prefs_path,
        })
    }
}
