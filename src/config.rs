//! Configuration management for streamwatch
//!
//! Two layers:
//! - `Config`: application config at ~/.config/streamwatch/config.toml
//!   (API endpoints, timeouts, log filter, data directory)
//! - `Settings`: user settings kept in `settings.cfg` inside the data
//!   directory (player path, default quality, auto-update)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::models::{DEFAULT_QUALITIES, DEFAULT_QUALITY};

/// Seconds before a status query is abandoned
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default log filter when neither RUST_LOG nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "warn,streamwatch=info";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where streams.list, settings.cfg and player logs live
    pub data_dir: Option<PathBuf>,
    /// Twitch API root override
    pub twitch_api_url: Option<String>,
    /// Client id sent with Twitch status queries
    pub twitch_client_id: Option<String>,
    /// Status query timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// tracing filter directive
    pub log_filter: Option<String>,
}

impl Config {
    /// Get config file path (~/.config/streamwatch/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamwatch").join("config.toml"))
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Load config from `path`; a missing or unreadable file gives defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring malformed config");
            Self::default()
        })
    }

    /// Data directory, falling back to the config directory
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|p| p.join("streamwatch")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

// =============================================================================
// User Settings
// =============================================================================

/// Auto-update interval bounds in seconds: (MIN, MAX]
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 2;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 5 * 60 * 60;

/// User settings consumed by the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Player / downloader executable
    pub player_path: String,
    /// Quality given to newly added entries
    pub default_quality: String,
    pub auto_update: bool,
    update_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_path: "livestreamer".to_string(),
            default_quality: DEFAULT_QUALITY.to_string(),
            auto_update: false,
            update_interval_secs: 60,
        }
    }
}

impl Settings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn update_interval_secs(&self) -> u64 {
        self.update_interval_secs
    }

    /// Set the auto-update interval; out of range values are rejected
    pub fn set_update_interval(&mut self, secs: u64) -> bool {
        if secs > MIN_UPDATE_INTERVAL_SECS && secs <= MAX_UPDATE_INTERVAL_SECS {
            self.update_interval_secs = secs;
            true
        } else {
            false
        }
    }

    /// Select the default quality by index into [`DEFAULT_QUALITIES`]
    pub fn set_quality_index(&mut self, index: usize) -> bool {
        match DEFAULT_QUALITIES.get(index) {
            Some(q) => {
                self.default_quality = q.to_string();
                true
            }
            None => false,
        }
    }

    pub fn quality_index(&self) -> usize {
        DEFAULT_QUALITIES
            .iter()
            .position(|q| *q == self.default_quality)
            .unwrap_or(0)
    }

    /// Set the player path; one-character paths are rejected
    pub fn set_player_path(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if path.trim().chars().count() > 1 {
            self.player_path = path.trim().to_string();
            true
        } else {
            false
        }
    }

    /// Parse the four-line settings file.
    ///
    /// Lines: player path, quality index, auto-update (0/1), interval seconds.
    /// Missing or out-of-range values keep their defaults.
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::default();
        let mut lines = text.lines().map(str::trim);

        if let Some(path) = lines.next() {
            settings.set_player_path(path);
        }
        if let Some(index) = lines.next().and_then(|l| l.parse::<usize>().ok()) {
            settings.set_quality_index(index);
        }
        match lines.next().and_then(|l| l.parse::<u8>().ok()) {
            Some(0) => settings.auto_update = false,
            Some(1) => settings.auto_update = true,
            _ => {}
        }
        if let Some(secs) = lines.next().and_then(|l| l.parse::<u64>().ok()) {
            settings.set_update_interval(secs);
        }

        settings
    }

    /// Render in the format [`Settings::parse`] reads
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n",
            self.player_path,
            self.quality_index(),
            u8::from(self.auto_update),
            self.update_interval_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.twitch_api_url.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
            twitch_api_url = "http://localhost:8080"
            request_timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.twitch_api_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let config = Config {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_settings_parse_valid() {
        let s = Settings::parse("/usr/bin/streamlink\n1\n1\n120\n");
        assert_eq!(s.player_path, "/usr/bin/streamlink");
        assert_eq!(s.default_quality, "worst");
        assert!(s.auto_update);
        assert_eq!(s.update_interval_secs(), 120);
    }

    #[test]
    fn test_settings_parse_keeps_defaults_on_garbage() {
        let s = Settings::parse("x\n7\n5\n2\n");
        assert_eq!(s, Settings::default());

        let s = Settings::parse("");
        assert_eq!(s, Settings::default());

        let s = Settings::parse("streamlink\nabc\n\n99999999\n");
        assert_eq!(s.player_path, "streamlink");
        assert_eq!(s.default_quality, "best");
        assert_eq!(s.update_interval_secs(), 60);
    }

    #[test]
    fn test_update_interval_bounds() {
        let mut s = Settings::default();
        assert!(!s.set_update_interval(2));
        assert!(s.set_update_interval(3));
        assert!(s.set_update_interval(18000));
        assert!(!s.set_update_interval(18001));
        assert_eq!(s.update_interval_secs(), 18000);
    }

    #[test]
    fn test_settings_render_parses_back() {
        let mut s = Settings::default();
        s.set_player_path("streamlink");
        s.set_quality_index(1);
        s.auto_update = true;
        s.set_update_interval(300);
        assert_eq!(Settings::parse(&s.render()), s);
    }
}
