//! HTTP feed fetcher.
//!
//! One GET per call with bounded connect and read timeouts. Retrying is left
//! to the scheduler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{FetchError, SyncError};

/// User agent string for feed fetching.
const USER_AGENT: &str = concat!("meowbah-sync/", env!("CARGO_PKG_VERSION"));

/// Raw body of a fetched feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent(pub Vec<u8>);

impl RawContent {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Source of raw feed documents.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchError>;
}

/// Fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
    max_feed_size: u64,
}

impl HttpFetcher {
    /// Create a fetcher with the given limits.
    pub fn new(config: &FetchConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchError> {
        let url = validate_url(url)?;
        debug!("Fetching feed {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::BadStatus(response.status().as_u16()));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FetchError::TooLarge {
                    size: content_length,
                    max: self.max_feed_size,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(FetchError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_feed_size,
            });
        }

        Ok(RawContent(bytes.to_vec()))
    }
}

/// Check that a feed URL is an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<url::Url, FetchError> {
    let parsed =
        url::Url::parse(url).map_err(|e| FetchError::MalformedUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FetchError::MalformedUrl(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(FetchError::MalformedUrl(format!("URL has no host: {url}")));
    }

    Ok(parsed)
}
