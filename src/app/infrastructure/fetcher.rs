use std::time::Duration;

use log::debug;

use super::error::{AppError, Result};
use crate::app::domain::EngineConfig;

/// Body and media type of a fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Media type without parameters, e.g. `font/woff2` for `font/woff2; charset=binary`.
    pub fn mime_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
    }
}

// The engine runs on a single thread; returned futures need not be Send.
#[allow(async_fn_in_trait)]
pub trait ResourceFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

/// Fetches over HTTP(S) with minreq on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.user_agent.clone(), config.fetch_timeout())
    }
}

impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        let request_url = url.to_string();
        let user_agent = self.user_agent.clone();
        let timeout_secs = self.timeout.as_secs().max(1);

        tokio::task::spawn_blocking(move || fetch_blocking(&request_url, &user_agent, timeout_secs))
            .await
            .map_err(|e| AppError::Network(format!("Fetch task for {} failed: {}", url, e)))?
    }
}

fn fetch_blocking(url: &str, user_agent: &str, timeout_secs: u64) -> Result<FetchedResource> {
    debug!("GET {}", url);
    let response = minreq::get(url)
        .with_header("User-Agent", user_agent)
        .with_timeout(timeout_secs)
        .send()
        .map_err(|e| AppError::Network(format!("Failed to fetch {}: {}", url, e)))?;

    if !(200..300).contains(&response.status_code) {
        return Err(AppError::Network(format!(
            "{} returned status {}",
            url, response.status_code
        )));
    }

    let content_type = response.headers.get("content-type").cloned();
    Ok(FetchedResource::new(response.into_bytes(), content_type))
}
