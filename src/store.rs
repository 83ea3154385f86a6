//! On-disk persistence
//!
//! Files inside the data directory:
//! - `streams.list`: `<url> <quality>` per line
//! - `settings.cfg`: see [`Settings::parse`]
//! - `<channel>.log`: output of the last player run for that channel

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::models::{StreamEntry, DEFAULT_QUALITY};

pub const STREAMS_FILENAME: &str = "streams.list";
pub const SETTINGS_FILENAME: &str = "settings.cfg";

/// One line of the stream list, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    pub url: String,
    pub quality: String,
}

/// Parse the stream list. Blank lines are skipped; a missing quality means `best`.
pub fn parse_stream_list(text: &str) -> Vec<StreamLine> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let url = parts.next()?;
            let quality = parts.last().unwrap_or(DEFAULT_QUALITY);
            Some(StreamLine {
                url: url.to_string(),
                quality: quality.to_string(),
            })
        })
        .collect()
}

/// Render entries in the format [`parse_stream_list`] reads
pub fn render_stream_list<'a>(entries: impl IntoIterator<Item = &'a StreamEntry>) -> String {
    entries
        .into_iter()
        .map(|e| format!("{} {}\n", e.url, e.preferred_quality))
        .collect()
}

/// Reads and writes the files in one data directory
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn streams_path(&self) -> PathBuf {
        self.dir.join(STREAMS_FILENAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILENAME)
    }

    /// Load the raw stream list; a missing file is an empty list
    pub fn load_streams(&self) -> Result<Vec<StreamLine>> {
        let path = self.streams_path();
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(parse_stream_list(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stream list yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to load streams from {}", path.display())),
        }
    }

    pub fn save_streams<'a>(&self, entries: impl IntoIterator<Item = &'a StreamEntry>) -> Result<()> {
        self.write(&self.streams_path(), &render_stream_list(entries))
    }

    /// Load settings; never fails, falling back to defaults
    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        match std::fs::read_to_string(&path) {
            Ok(text) => Settings::parse(&text),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to load settings");
                }
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(&self.settings_path(), &settings.render())
    }

    /// Write a finished player run's output to `<name>.log`
    pub fn write_process_log(&self, name: &str, lines: &[String]) -> Result<PathBuf> {
        let file_name: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("{}.log", file_name));
        let mut text = lines.join("\n");
        text.push('\n');
        self.write(&path, &text)?;
        Ok(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
    }
}
