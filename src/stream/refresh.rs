//! Refresh engine
//!
//! Issues one status query per entry as an independent task and applies each
//! reply when the session hands it back. An entry never has two queries in
//! flight at once.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::Event;
use crate::api::{RefreshError, StatusClient};
use crate::models::{ChannelStatus, EntryKey, StreamEntry};
use crate::registry::Registry;

/// What applying a reply did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Status changed
    Changed,
    /// Reply matched what we already had
    Unchanged,
    /// Query failed; previous status kept
    Stale,
    /// Entry no longer tracked; reply dropped
    Discarded,
}

pub struct RefreshEngine {
    client: Arc<StatusClient>,
    events: UnboundedSender<Event>,
    in_flight: HashSet<EntryKey>,
}

impl RefreshEngine {
    pub fn new(client: StatusClient, events: UnboundedSender<Event>) -> Self {
        Self {
            client: Arc::new(client),
            events,
            in_flight: HashSet::new(),
        }
    }

    /// Query every entry that has no query outstanding. Returns how many
    /// queries were issued.
    pub fn refresh_all(&mut self, registry: &Registry) -> usize {
        registry
            .list()
            .iter()
            .filter(|entry| self.refresh_one(entry))
            .count()
    }

    /// Query one entry unless a query for it is already in flight
    pub fn refresh_one(&mut self, entry: &StreamEntry) -> bool {
        if !self.in_flight.insert(entry.key) {
            debug!(channel = %entry.display_name, "refresh already in flight");
            return false;
        }

        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        let key = entry.key;
        let provider = entry.provider;
        let channel = entry.display_name.clone();

        tokio::spawn(async move {
            let result = client.fetch_status(provider, &channel).await;
            // Receiver gone means the session shut down
            let _ = events.send(Event::Status { key, result });
        });
        true
    }

    /// Apply a reply to the registry, if its entry is still there
    pub fn apply(
        &mut self,
        registry: &mut Registry,
        key: EntryKey,
        result: Result<ChannelStatus, RefreshError>,
    ) -> RefreshOutcome {
        self.in_flight.remove(&key);

        let Some(entry) = registry.get_mut(key) else {
            debug!(%key, "dropping status for removed entry");
            return RefreshOutcome::Discarded;
        };

        match result {
            Ok(status) => {
                if entry.apply_status(status) {
                    debug!(channel = %entry.display_name, ?status, "status changed");
                    RefreshOutcome::Changed
                } else {
                    RefreshOutcome::Unchanged
                }
            }
            Err(e) => {
                warn!(channel = %entry.display_name, error = %e, "refresh failed, keeping last status");
                RefreshOutcome::Stale
            }
        }
    }

    /// Stop waiting for an entry's reply (entry removed)
    pub fn forget(&mut self, key: EntryKey) {
        self.in_flight.remove(&key);
    }

    pub fn is_pending(&self, key: EntryKey) -> bool {
        self.in_flight.contains(&key)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_QUALITY;
    use crate::provider::classify;
    use crate::stream::Launcher;
    use tokio::sync::mpsc;

    fn setup() -> (RefreshEngine, Registry, EntryKey) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = RefreshEngine::new(StatusClient::default(), tx);
        let mut registry = Registry::new();
        let entry = StreamEntry::new(classify("https://twitch.tv/a").unwrap(), DEFAULT_QUALITY);
        let key = registry.add(entry).unwrap();
        (engine, registry, key)
    }

    #[test]
    fn test_apply_live_then_error_keeps_status() {
        let (mut engine, mut registry, key) = setup();

        let outcome = engine.apply(&mut registry, key, Ok(ChannelStatus::Live { viewers: 42 }));
        assert_eq!(outcome, RefreshOutcome::Changed);

        let outcome = engine.apply(&mut registry, key, Err(RefreshError::Status(503)));
        assert_eq!(outcome, RefreshOutcome::Stale);

        let entry = registry.get(key).unwrap();
        assert!(entry.online);
        assert_eq!(entry.viewer_count, 42);
    }

    #[test]
    fn test_apply_offline_resets_viewers() {
        let (mut engine, mut registry, key) = setup();
        engine.apply(&mut registry, key, Ok(ChannelStatus::Live { viewers: 7 }));
        engine.apply(&mut registry, key, Ok(ChannelStatus::Offline));

        let entry = registry.get(key).unwrap();
        assert!(!entry.online);
        assert_eq!(entry.viewer_count, 0);
    }

    #[test]
    fn test_reply_for_replaced_entry_is_discarded() {
        let (mut engine, mut registry, old_key) = setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut launcher = Launcher::new(tx);

        registry.remove("https://twitch.tv/a", &mut launcher);
        let entry = StreamEntry::new(classify("https://twitch.tv/a").unwrap(), DEFAULT_QUALITY);
        let new_key = registry.add(entry).unwrap();

        let outcome = engine.apply(&mut registry, old_key, Ok(ChannelStatus::Live { viewers: 9 }));
        assert_eq!(outcome, RefreshOutcome::Discarded);
        assert_eq!(registry.len(), 1);
        assert!(!registry.get(new_key).unwrap().online);
    }
}
