//! Data structures shared across streamwatch
//!
//! - **Entries**: one tracked channel, its last known status and launch flag
//! - **Status**: what a provider reported for a channel
//! - **Qualities**: player quality tokens and the default set

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::provider::{Provider, Resolved};

// =============================================================================
// Quality Tokens
// =============================================================================

/// Quality used when none is given
pub const DEFAULT_QUALITY: &str = "best";

/// Qualities every entry offers before the player reports its own list
pub const DEFAULT_QUALITIES: &[&str] = &["best", "worst"];

// =============================================================================
// Entry Key
// =============================================================================

/// Internal handle for one registry membership.
///
/// Two entries with the same URL added at different times get different keys,
/// so a late completion for a removed entry never lands on its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey(Uuid);

impl EntryKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Channel Status
// =============================================================================

/// Parsed reply of one status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ChannelStatus {
    Live { viewers: u64 },
    Offline,
}

// =============================================================================
// Stream Entry
// =============================================================================

/// One tracked channel
#[derive(Debug, Clone, Serialize)]
pub struct StreamEntry {
    #[serde(skip)]
    pub key: EntryKey,
    /// Canonical URL, also the entry's identity
    pub url: String,
    pub provider: Provider,
    pub display_name: String,
    pub online: bool,
    pub viewer_count: u64,
    pub watching: bool,
    pub preferred_quality: String,
    pub available_qualities: Vec<String>,
}

impl StreamEntry {
    /// Build a fresh, offline entry from a classified URL
    pub fn new(resolved: Resolved, quality: impl Into<String>) -> Self {
        let mut entry = Self {
            key: EntryKey::new(),
            url: resolved.url,
            provider: resolved.provider,
            display_name: resolved.display_name,
            online: false,
            viewer_count: 0,
            watching: false,
            preferred_quality: String::new(),
            available_qualities: DEFAULT_QUALITIES.iter().map(|q| q.to_string()).collect(),
        };
        entry.select_quality(quality);
        entry
    }

    /// Whether `identity` names this entry (canonical URL comparison)
    pub fn is(&self, identity: &str) -> bool {
        self.url == identity
    }

    /// Record a successful status reply.
    ///
    /// Returns true when something visible changed.
    pub fn apply_status(&mut self, status: ChannelStatus) -> bool {
        let (online, viewers) = match status {
            ChannelStatus::Live { viewers } => (true, viewers),
            ChannelStatus::Offline => (false, 0),
        };
        let changed = self.online != online || self.viewer_count != viewers;
        self.online = online;
        self.viewer_count = viewers;
        changed
    }

    /// Make `quality` the preferred one, offering it if it is not known yet
    pub fn select_quality(&mut self, quality: impl Into<String>) {
        let quality = quality.into();
        if !self.available_qualities.iter().any(|q| *q == quality) {
            self.available_qualities.push(quality.clone());
        }
        self.preferred_quality = quality;
    }

    /// Replace the offered qualities with what the player reported.
    ///
    /// The list always starts with `best` and ends with `worst`; the
    /// preferred quality survives even if the player did not list it.
    pub fn set_available_qualities<S: AsRef<str>>(&mut self, reported: &[S]) {
        let mut qualities = vec!["best".to_string()];
        qualities.extend(
            reported
                .iter()
                .map(|q| q.as_ref().trim())
                .filter(|q| !q.is_empty() && !q.contains("best") && !q.contains("worst"))
                .map(str::to_string),
        );
        qualities.push("worst".to_string());
        self.available_qualities = qualities;

        let preferred = std::mem::take(&mut self.preferred_quality);
        self.select_quality(preferred);
    }
}

impl PartialEq for StreamEntry {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for StreamEntry {}

impl fmt::Display for StreamEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.online {
            format!("{:>7}", self.viewer_count)
        } else {
            format!("{:>7}", "offline")
        };
        write!(f, "{:<24} {} [{}]", self.display_name, status, self.preferred_quality)?;
        if self.watching {
            write!(f, " ▶ watching")?;
        }
        Ok(())
    }
}
