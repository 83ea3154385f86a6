//! Session state and event handling
//!
//! A `Session` owns the registry, the refresh engine and the launcher. User
//! commands run synchronously against it; network replies and player events
//! come back through one channel and are applied by [`Session::handle_event`],
//! one at a time. Every handler looks its entry up again before touching it.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::api::StatusClient;
use crate::config::Settings;
use crate::models::{EntryKey, StreamEntry};
use crate::provider::{classify, ResolveError};
use crate::registry::{Registry, RegistryError};
use crate::store::{StreamLine, Store};
use crate::stream::launcher::parse_available_streams;
use crate::stream::{
    Event, ExitKind, LaunchError, Launcher, RefreshEngine, RefreshOutcome, WatchState,
};

/// Errors surfaced to the user for a rejected command
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("No stream matches '{0}'")]
    NotFound(String),

    #[error("{0} is offline")]
    Offline(String),
}

/// Something the UI should tell the user about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    StatusChanged {
        name: String,
        online: bool,
        viewers: u64,
    },
    Started {
        name: String,
    },
    Stopped {
        name: String,
    },
    ProcessCrashed {
        name: String,
        code: Option<i32>,
    },
    QualitiesChanged {
        name: String,
        qualities: Vec<String>,
    },
    RefreshFailed {
        name: String,
        error: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::StatusChanged {
                name,
                online: true,
                viewers,
            } => write!(f, "{} is live ({} viewers)", name, viewers),
            Notice::StatusChanged { name, .. } => write!(f, "{} is offline", name),
            Notice::Started { name } => write!(f, "{} starting...", name),
            Notice::Stopped { name } => write!(f, "{} stopped", name),
            Notice::ProcessCrashed {
                name,
                code: Some(code),
            } => write!(f, "{}: player exited prematurely (code {})", name, code),
            Notice::ProcessCrashed { name, code: None } => {
                write!(f, "{}: player exited prematurely", name)
            }
            Notice::QualitiesChanged { name, qualities } => {
                write!(f, "{} qualities: {}", name, qualities.join(", "))
            }
            Notice::RefreshFailed { name, error } => {
                write!(f, "{}: refresh failed ({})", name, error)
            }
        }
    }
}

/// Result of loading a stream list
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub errors: Vec<String>,
}

pub struct Session {
    registry: Registry,
    refresh: RefreshEngine,
    launcher: Launcher,
    settings: Settings,
    store: Option<Store>,
    events: UnboundedReceiver<Event>,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new(client: StatusClient, settings: Settings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry: Registry::new(),
            refresh: RefreshEngine::new(client, tx.clone()),
            launcher: Launcher::new(tx),
            settings,
            store: None,
            events: rx,
            notices: Vec::new(),
        }
    }

    /// Persist player logs and save state through `store`
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// How long a player gets to exit after being asked to stop
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.launcher.set_grace_period(grace);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn entries(&self) -> &[StreamEntry] {
        self.registry.list()
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn refresh_engine(&self) -> &RefreshEngine {
        &self.refresh
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Find an entry by URL (any accepted spelling) or by channel name
    pub fn lookup(&self, input: &str) -> Option<&StreamEntry> {
        match classify(input) {
            Ok(resolved) => self.registry.find(&resolved.url),
            Err(_) => self.registry.find_by_name(input.trim()),
        }
    }

    fn lookup_key(&self, input: &str) -> Result<EntryKey, SessionError> {
        self.lookup(input)
            .map(|e| e.key)
            .ok_or_else(|| SessionError::NotFound(input.trim().to_string()))
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Track a new URL and query its status right away
    pub fn add(&mut self, url: &str, quality: Option<&str>) -> Result<EntryKey, SessionError> {
        let key = self.insert(url, quality)?;
        if let Some(entry) = self.registry.get(key) {
            self.refresh.refresh_one(entry);
        }
        Ok(key)
    }

    fn insert(&mut self, url: &str, quality: Option<&str>) -> Result<EntryKey, SessionError> {
        let resolved = classify(url)?;
        let quality = quality.unwrap_or(&self.settings.default_quality).to_string();
        let entry = StreamEntry::new(resolved, quality);
        let name = entry.display_name.clone();
        let key = self.registry.add(entry)?;
        info!(channel = %name, "stream added");
        Ok(key)
    }

    /// Re-validate saved lines. Bad lines are reported and skipped.
    pub fn load(&mut self, lines: &[StreamLine]) -> LoadReport {
        let mut report = LoadReport::default();
        for line in lines {
            match self.insert(&line.url, Some(&line.quality)) {
                Ok(_) => report.loaded += 1,
                Err(e) => {
                    warn!(url = %line.url, error = %e, "skipping saved stream");
                    report.errors.push(format!("Loading {}: {}", line.url, e));
                }
            }
        }
        report
    }

    /// Stop tracking an entry. Unknown input is a no-op.
    pub fn remove(&mut self, input: &str) -> Option<StreamEntry> {
        let url = self.lookup(input)?.url.clone();
        let entry = self.registry.remove(&url, &mut self.launcher)?;
        self.refresh.forget(entry.key);
        info!(channel = %entry.display_name, "stream removed");
        Some(entry)
    }

    /// Stop tracking everything; returns how many entries were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.registry.clear(&mut self.launcher);
        for entry in &removed {
            self.refresh.forget(entry.key);
        }
        removed.len()
    }

    // -------------------------------------------------------------------------
    // Refresh / watch
    // -------------------------------------------------------------------------

    /// Query every entry without a query already outstanding
    pub fn refresh_all(&mut self) -> usize {
        let issued = self.refresh.refresh_all(&self.registry);
        debug!(issued, "refresh sweep");
        issued
    }

    /// Launch the player for an entry using its preferred quality.
    ///
    /// Offline entries are refused unless `force` is set.
    pub fn watch(&mut self, input: &str, force: bool) -> Result<EntryKey, SessionError> {
        let key = self.lookup_key(input)?;
        let entry = self
            .registry
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(input.trim().to_string()))?;

        if self.launcher.state(key) != WatchState::Idle {
            return Err(LaunchError::AlreadyRunning(entry.display_name.clone()).into());
        }
        if !force && !entry.online {
            return Err(SessionError::Offline(entry.display_name.clone()));
        }

        let quality = entry.preferred_quality.clone();
        self.launcher
            .watch(entry, &self.settings.player_path, &quality)?;
        self.notices.push(Notice::Started {
            name: entry.display_name.clone(),
        });
        Ok(key)
    }

    /// Query one entry's status now
    pub fn refresh(&mut self, input: &str) -> Result<bool, SessionError> {
        let key = self.lookup_key(input)?;
        Ok(self
            .registry
            .get(key)
            .is_some_and(|entry| self.refresh.refresh_one(entry)))
    }

    pub fn set_quality(&mut self, input: &str, quality: &str) -> Result<(), SessionError> {
        let key = self.lookup_key(input)?;
        if let Some(entry) = self.registry.get_mut(key) {
            entry.select_quality(quality.trim());
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Wait for one event and apply it
    pub async fn process_next(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until no status query is outstanding
    pub async fn settle_refresh(&mut self) {
        while self.refresh.in_flight() > 0 {
            if !self.process_next().await {
                break;
            }
        }
    }

    /// Apply events until the player for `key` is gone
    pub async fn wait_for_exit(&mut self, key: EntryKey) {
        while self.launcher.is_running(key) {
            if !self.process_next().await {
                break;
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Status { key, result } => {
                let error = result.as_ref().err().map(ToString::to_string);
                let outcome = self.refresh.apply(&mut self.registry, key, result);
                let Some(entry) = self.registry.get(key) else {
                    return;
                };
                match (outcome, error) {
                    (RefreshOutcome::Changed, _) => self.notices.push(Notice::StatusChanged {
                        name: entry.display_name.clone(),
                        online: entry.online,
                        viewers: entry.viewer_count,
                    }),
                    (RefreshOutcome::Stale, Some(error)) => self.notices.push(Notice::RefreshFailed {
                        name: entry.display_name.clone(),
                        error,
                    }),
                    _ => {}
                }
            }
            Event::Output { key, line } => self.on_output(key, &line),
            Event::Exited { key, kind } => self.on_exit(key, kind),
        }
    }

    fn on_output(&mut self, key: EntryKey, line: &str) {
        if !self.launcher.record_output(key, line) {
            return;
        }
        let Some(entry) = self.registry.get_mut(key) else {
            return;
        };
        debug!(channel = %entry.display_name, "{}", line);

        if let Some(reported) = parse_available_streams(line) {
            entry.set_available_qualities(&reported);
            self.notices.push(Notice::QualitiesChanged {
                name: entry.display_name.clone(),
                qualities: entry.available_qualities.clone(),
            });
        }
    }

    fn on_exit(&mut self, key: EntryKey, kind: ExitKind) {
        // Already terminated by removal or shutdown
        let Some(log) = self.launcher.finish(key) else {
            return;
        };
        let Some(entry) = self.registry.get_mut(key) else {
            return;
        };
        entry.watching = false;
        let name = entry.display_name.clone();

        match kind {
            ExitKind::Crashed { code } => {
                warn!(channel = %name, ?code, "player exited prematurely");
                self.notices.push(Notice::ProcessCrashed { name: name.clone(), code });
            }
            ExitKind::Clean | ExitKind::Terminated => {
                info!(channel = %name, "player stopped");
                self.notices.push(Notice::Stopped { name: name.clone() });
            }
        }

        if let Some(store) = &self.store {
            match store.write_process_log(&name, &log) {
                Ok(path) => debug!(path = %path.display(), "player log written"),
                Err(e) => warn!(error = %e, "failed to write player log"),
            }
        }
    }

    /// Take the notices gathered since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Save the stream list and settings, if a store is attached
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(store) = &self.store {
            store.save_streams(self.registry.list())?;
            store.save_settings(&self.settings)?;
        }
        Ok(())
    }

    /// Stop every player and wait for them to exit
    pub async fn shutdown(&mut self) {
        self.launcher.shutdown().await;
        let keys: Vec<EntryKey> = self.registry.list().iter().map(|e| e.key).collect();
        for key in keys {
            if let Some(entry) = self.registry.get_mut(key) {
                entry.watching = false;
            }
        }
    }
}
