//! Status API clients
//!
//! - `StatusClient`: one GET per channel, dispatched through the provider table
//! - Twitch: channel status via the streams endpoint

pub mod twitch;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::ChannelStatus;
use crate::provider::Provider;

/// Transient status query failure. The entry keeps its previous status.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// HTTP client shared by every status query
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: reqwest::Client,
    base_urls: HashMap<Provider, String>,
    client_ids: HashMap<Provider, String>,
}

impl StatusClient {
    /// Create a client using each provider's default API root
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_urls: HashMap::new(),
            client_ids: HashMap::new(),
        }
    }

    /// Create a client from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(config.request_timeout());
        if let Some(url) = &config.twitch_api_url {
            client = client.with_base_url(Provider::Twitch, url.clone());
        }
        if let Some(id) = &config.twitch_client_id {
            client = client.with_client_id(Provider::Twitch, id.clone());
        }
        client
    }

    /// Override a provider's API root (for testing or mirrors)
    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn with_client_id(mut self, provider: Provider, client_id: impl Into<String>) -> Self {
        self.client_ids.insert(provider, client_id.into());
        self
    }

    fn base_url(&self, provider: Provider) -> &str {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(provider.descriptor().default_api_url)
    }

    /// Query one channel's status
    pub async fn fetch_status(
        &self,
        provider: Provider,
        channel: &str,
    ) -> Result<ChannelStatus, RefreshError> {
        let descriptor = provider.descriptor();
        let url = format!(
            "{}{}",
            self.base_url(provider).trim_end_matches('/'),
            (descriptor.status_path)(channel)
        );
        debug!(%provider, channel, %url, "querying status");

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let (Some(header), Some(id)) = (descriptor.client_id_header, self.client_ids.get(&provider)) {
            request = request.header(header, id);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                (descriptor.parse_status)(&body)
            }
            status => Err(RefreshError::Status(status.as_u16())),
        }
    }
}

impl Default for StatusClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}
