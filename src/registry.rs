//! The ordered set of tracked entries
//!
//! The registry owns membership only: it never changes an entry's status.
//! Removing an entry first asks the launcher to stop its player.

use thiserror::Error;

use crate::models::{EntryKey, StreamEntry};
use crate::stream::Launcher;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Error: duplicate.")]
    Duplicate,
}

/// Display sort column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Name,
    #[default]
    Viewers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<StreamEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless an equal one is already tracked
    pub fn add(&mut self, entry: StreamEntry) -> Result<EntryKey, RegistryError> {
        if self.entries.iter().any(|e| *e == entry) {
            return Err(RegistryError::Duplicate);
        }
        let key = entry.key;
        self.entries.push(entry);
        Ok(key)
    }

    /// Remove the entry with this canonical URL, stopping its player first.
    /// Absent identities are a no-op.
    pub fn remove(&mut self, identity: &str, launcher: &mut Launcher) -> Option<StreamEntry> {
        let index = self.entries.iter().position(|e| e.is(identity))?;
        launcher.terminate(self.entries[index].key);
        Some(self.entries.remove(index))
    }

    /// Remove everything, stopping every player first
    pub fn clear(&mut self, launcher: &mut Launcher) -> Vec<StreamEntry> {
        for entry in &self.entries {
            launcher.terminate(entry.key);
        }
        std::mem::take(&mut self.entries)
    }

    pub fn list(&self) -> &[StreamEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: EntryKey) -> Option<&StreamEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn get_mut(&mut self, key: EntryKey) -> Option<&mut StreamEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }

    pub fn contains(&self, key: EntryKey) -> bool {
        self.get(key).is_some()
    }

    pub fn find(&self, identity: &str) -> Option<&StreamEntry> {
        self.entries.iter().find(|e| e.is(identity))
    }

    /// Find by channel name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&StreamEntry> {
        self.entries
            .iter()
            .find(|e| e.display_name.eq_ignore_ascii_case(name))
    }

    /// Entries ordered for display. Ties keep insertion order.
    pub fn sorted(&self, key: SortKey, order: SortOrder) -> Vec<&StreamEntry> {
        let mut view: Vec<&StreamEntry> = self.entries.iter().collect();
        view.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Name => a
                    .display_name
                    .to_lowercase()
                    .cmp(&b.display_name.to_lowercase()),
                SortKey::Viewers => a.viewer_count.cmp(&b.viewer_count),
            };
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_QUALITY;
    use crate::provider::classify;
    use tokio::sync::mpsc;

    fn entry(url: &str) -> StreamEntry {
        StreamEntry::new(classify(url).unwrap(), DEFAULT_QUALITY)
    }

    fn launcher() -> Launcher {
        let (tx, _rx) = mpsc::unbounded_channel();
        Launcher::new(tx)
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let mut registry = Registry::new();
        assert!(registry.add(entry("https://twitch.tv/a")).is_ok());
        assert_eq!(
            registry.add(entry("https://www.Twitch.tv/a")),
            Err(RegistryError::Duplicate)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_preserves_order() {
        let mut registry = Registry::new();
        for name in ["c", "a", "b"] {
            registry.add(entry(&format!("https://twitch.tv/{}", name))).unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = Registry::new();
        let mut launcher = launcher();
        registry.add(entry("https://twitch.tv/a")).unwrap();
        assert!(registry.remove("https://twitch.tv/zzz", &mut launcher).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sorted_by_name_and_viewers() {
        let mut registry = Registry::new();
        let mut a = entry("https://twitch.tv/Bravo");
        a.viewer_count = 5;
        let mut b = entry("https://twitch.tv/alpha");
        b.viewer_count = 50;
        let c = entry("https://twitch.tv/charlie");
        registry.add(a).unwrap();
        registry.add(b).unwrap();
        registry.add(c).unwrap();

        let by_name: Vec<_> = registry
            .sorted(SortKey::Name, SortOrder::Ascending)
            .iter()
            .map(|e| e.display_name.clone())
            .collect();
        assert_eq!(by_name, vec!["alpha", "Bravo", "charlie"]);

        let by_viewers: Vec<_> = registry
            .sorted(SortKey::Viewers, SortOrder::Descending)
            .iter()
            .map(|e| e.viewer_count)
            .collect();
        assert_eq!(by_viewers, vec![50, 5, 0]);
    }
}
