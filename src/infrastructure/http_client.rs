//! HTTP client for the training service
//!
//! Fetches progress snapshots and final results over plain JSON GETs and maps
//! every failure onto a `FetchError` so the synchronizer can decide what to do.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::domain::constants::{PROGRESS_PATH, RESULTS_API_SEGMENTS, RESULTS_PURPOSE_SEGMENT};
use crate::domain::errors::FetchError;
use crate::domain::progress::ProgressSnapshot;
use crate::domain::results::TrainingResults;
use crate::domain::services::{ProgressSource, ResultsSource};
use crate::domain::session::SessionKey;

/// HTTP client configuration for the training service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Service root, e.g. `http://localhost:5000`
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout, so a hung request cannot outlive many ticks
    pub timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            user_agent: concat!("pinn-live-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Progress and results source backed by the training service's JSON API
#[derive(Debug, Clone)]
pub struct HttpProgressSource {
    client: Client,
    base_url: Url,
    config: HttpClientConfig,
}

impl HttpProgressSource {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Base URL cannot carry a path: {}", config.base_url);
        }

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `{base}/api/training-progress/{purpose}/{equation}`
    pub fn progress_url(&self, key: &SessionKey) -> Url {
        let [api, progress] = PROGRESS_PATH;
        self.endpoint(&[api, progress, key.purpose.as_str(), key.equation_type.as_str()])
    }

    /// `{base}/purpose/{purpose}/api/results/{equation}`
    pub fn results_url(&self, key: &SessionKey) -> Url {
        let [api, results] = RESULTS_API_SEGMENTS;
        self.endpoint(&[
            RESULTS_PURPOSE_SEGMENT,
            key.purpose.as_str(),
            api,
            results,
            key.equation_type.as_str(),
        ])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        tracing::debug!("Fetching JSON from: {}", url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: format!("Failed to read response body: {e}"),
        })?;

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ProgressSource for HttpProgressSource {
    async fn fetch_progress(&self, key: &SessionKey) -> Result<ProgressSnapshot, FetchError> {
        self.get_json(self.progress_url(key)).await
    }
}

#[async_trait]
impl ResultsSource for HttpProgressSource {
    async fn fetch_results(&self, key: &SessionKey) -> Result<TrainingResults, FetchError> {
        let results: TrainingResults = self.get_json(self.results_url(key)).await?;
        tracing::info!("📥 Fetched training results for {}", key);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> HttpProgressSource {
        HttpProgressSource::new(HttpClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_http_source_creation() {
        assert!(HttpProgressSource::new(HttpClientConfig::default()).is_ok());
        assert!(
            HttpProgressSource::new(HttpClientConfig {
                base_url: "not a url".into(),
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn test_progress_url_layout() {
        let key = SessionKey::new("forward_problems", "heat");
        assert_eq!(
            source("http://localhost:5000").progress_url(&key).as_str(),
            "http://localhost:5000/api/training-progress/forward_problems/heat"
        );
        // Trailing slash and a mounted prefix are both preserved correctly
        assert_eq!(
            source("http://host/pinn/").progress_url(&key).as_str(),
            "http://host/pinn/api/training-progress/forward_problems/heat"
        );
    }

    #[test]
    fn test_results_url_layout() {
        let key = SessionKey::new("inverse_problems", "wave");
        assert_eq!(
            source("http://localhost:5000").results_url(&key).as_str(),
            "http://localhost:5000/purpose/inverse_problems/api/results/wave"
        );
    }

    #[test]
    fn test_session_parts_are_percent_encoded() {
        let key = SessionKey::new("a/b", "c d");
        assert_eq!(
            source("http://localhost").progress_url(&key).as_str(),
            "http://localhost/api/training-progress/a%2Fb/c%20d"
        );
    }
}
