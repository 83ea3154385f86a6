//! Provider resolution
//!
//! Turns a raw URL typed by the user into a provider tag, a canonical URL and
//! a channel name. Every provider is described by a [`ProviderDescriptor`];
//! adding one means adding a variant and a table row, nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::api::{twitch, RefreshError};
use crate::models::ChannelStatus;

/// Errors from URL classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Invalid url.")]
    InvalidUrl,
    #[error("Host not supported.")]
    UnsupportedHost,
}

/// Streaming services we know how to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Twitch,
}

impl Provider {
    /// Every provider, in lookup order
    pub const ALL: &'static [Provider] = &[Provider::Twitch];

    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        match self {
            Provider::Twitch => &twitch::DESCRIPTOR,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor().name)
    }
}

/// Everything the rest of the crate needs to know about a provider
pub struct ProviderDescriptor {
    pub name: &'static str,
    /// Hosts equal to this, or ending in `.` + this, belong to the provider
    pub host_suffix: &'static str,
    /// Status API root used when the config does not override it
    pub default_api_url: &'static str,
    /// Header carrying the configured client id, if the API wants one
    pub client_id_header: Option<&'static str>,
    /// Path (relative to the API root) of the status query for a channel
    pub status_path: fn(&str) -> String,
    /// Parses a status response body
    pub parse_status: fn(&str) -> Result<ChannelStatus, RefreshError>,
}

impl ProviderDescriptor {
    pub fn matches_host(&self, host: &str) -> bool {
        host == self.host_suffix
            || host
                .strip_suffix(self.host_suffix)
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

/// Result of a successful classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub provider: Provider,
    pub url: String,
    pub display_name: String,
}

/// Classify a raw URL. Pure: no I/O, same input gives the same answer.
pub fn classify(raw: &str) -> Result<Resolved, ResolveError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolveError::InvalidUrl);
    }

    let parsed = Url::parse(raw).map_err(|_| ResolveError::InvalidUrl)?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ResolveError::InvalidUrl)?
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    let provider = Provider::ALL
        .iter()
        .copied()
        .find(|p| p.descriptor().matches_host(&host))
        .ok_or(ResolveError::UnsupportedHost)?;

    let display_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
        .ok_or(ResolveError::InvalidUrl)?;

    Ok(Resolved {
        provider,
        url: format!("{}://{}{}", parsed.scheme(), host, parsed.path()),
        display_name,
    })
}
