//! Upstream transport -- the paged list endpoints of the test-automation backend.

pub mod envelope;
pub mod paginator;

pub use self::paginator::{Collected, Paginator};

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::UpstreamConfig;

const USER_AGENT_VALUE: &str = concat!("testpulse/", env!("CARGO_PKG_VERSION"));

/// Why a single page request produced nothing usable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("malformed payload from {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Describes one paged list resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    /// Page size we would like to request.
    pub page_size: u32,
    /// Server-documented maximum; larger requests are silently capped upstream.
    pub page_ceiling: Option<u32>,
    /// Field the item array is wrapped under when `data` is an object.
    pub items_field: Option<String>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, page_size: u32) -> Self {
        Self {
            path: path.into(),
            page_size,
            page_ceiling: None,
            items_field: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.page_ceiling = Some(ceiling);
        self
    }

    pub fn with_items_field(mut self, field: impl Into<String>) -> Self {
        self.items_field = Some(field.into());
        self
    }

    /// Page size actually sent: never above the ceiling, never zero.
    pub fn effective_page_size(&self) -> u32 {
        let size = match self.page_ceiling {
            Some(ceiling) => self.page_size.min(ceiling),
            None => self.page_size,
        };
        size.max(1)
    }
}

/// Anything that can hand back one raw page of a list resource.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch `page` (1-based) of `path` with `page_size` items per page.
    async fn fetch_page(&self, path: &str, page: u32, page_size: u32) -> Result<Value, FetchError>;
}

/// reqwest-backed client for the backend's JSON API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT_VALUE)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl PageSource for ApiClient {
    async fn fetch_page(&self, path: &str, page: u32, page_size: u32) -> Result<Value, FetchError> {
        let url = self.url(path);
        debug!(url = %url, page, page_size, "fetching page");

        let mut request = self
            .client
            .get(&url)
            .query(&[("page", page), ("page_size", page_size)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| FetchError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}
