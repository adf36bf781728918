//! Runtime settings for an evaluation run.
//!
//! Everything operational lives here: where the benchmark data sits, where
//! the content server listens, how many browser sessions may be live, and
//! how the model collaborator is reached. Loaded from `RESTYLE_*` environment
//! variables with sensible defaults, or constructed programmatically.

use anyhow::{Context as _, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Runtime configuration for the evaluation harness.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Root of the benchmark data tree (`{project}/pages/{page}/...`).
    pub data_dir: PathBuf,
    /// Base URL of the local content server that serves `data_dir`.
    pub base_url: Url,
    /// Maximum number of concurrently live browser sessions.
    pub max_sessions: usize,
    /// Base URL of the model completion API.
    pub api_base: Url,
    /// Bearer token for the completion API, if required.
    pub api_key: Option<String>,
    /// Per-request timeout for model calls.
    pub model_timeout: Duration,
    /// Retry cap for transient model-call failures.
    pub max_retries: u32,
    /// Fixed delay between model-call retries.
    pub retry_delay: Duration,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Reads:
    /// - `RESTYLE_DATA_DIR`: benchmark data root (default: `data`)
    /// - `RESTYLE_BASE_URL`: content server (default: `http://localhost:8000/`)
    /// - `RESTYLE_MAX_SESSIONS`: browser session cap (default: 10)
    /// - `RESTYLE_API_BASE`: completion API (default: `https://openrouter.ai/api/v1/`)
    /// - `RESTYLE_API_KEY`: bearer token (optional)
    /// - `RESTYLE_MODEL_TIMEOUT_SECS`: model call timeout (default: 120)
    /// - `RESTYLE_MAX_RETRIES`: retry cap (default: 5)
    /// - `RESTYLE_RETRY_DELAY_SECS`: delay between retries (default: 10)
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL fails to parse.
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("RESTYLE_DATA_DIR")
            .map_or_else(|_| PathBuf::from("data"), PathBuf::from);
        let base_url = env::var("RESTYLE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000/".to_owned());
        let base_url = Url::parse(&base_url).context("RESTYLE_BASE_URL is not a valid URL")?;
        let api_base = env::var("RESTYLE_API_BASE")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1/".to_owned());
        let api_base = Url::parse(&api_base).context("RESTYLE_API_BASE is not a valid URL")?;

        let max_sessions = env::var("RESTYLE_MAX_SESSIONS")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(10)
            .max(1);
        let model_timeout = env::var("RESTYLE_MODEL_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(120)
            .max(1);
        let max_retries = env::var("RESTYLE_MAX_RETRIES")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(5);
        let retry_delay = env::var("RESTYLE_RETRY_DELAY_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(10);

        Ok(Self {
            data_dir,
            base_url,
            max_sessions,
            api_base,
            api_key: env::var("RESTYLE_API_KEY").ok(),
            model_timeout: Duration::from_secs(model_timeout),
            max_retries,
            retry_delay: Duration::from_secs(retry_delay),
        })
    }
}
