//! Bounded, deduplicated history of resolved URLs.
//!
//! Entries are kept most-recent-first, at most one per URL, at most
//! [`HISTORY_LIMIT`] in total. The list is persisted as one JSON array under
//! [`HISTORY_KEY`]. Persistence problems never fail an operation; they come
//! back as a [`PersistenceWarning`] next to the in-memory result.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::errors::PersistenceWarning;
use super::models::HistoryEntry;
use super::storage::KeyValueStore;

pub const HISTORY_KEY: &str = "download_history";
pub const HISTORY_LIMIT: usize = 20;

/// Result of [`HistoryStore::record`]
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub entry: HistoryEntry,
    pub warning: Option<PersistenceWarning>,
}

pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    limit: usize,
    // Coarse lock: record/clear are read-modify-write against storage
    state: Mutex<State>,
}

struct State {
    entries: Vec<HistoryEntry>,
    /// Memory is ahead of storage after a failed write
    unsaved: bool,
}

impl HistoryStore {
    /// Load persisted history. Missing or unreadable data starts empty.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::load_with_limit(storage, HISTORY_LIMIT)
    }

    /// Like [`HistoryStore::load`] with a smaller bound (clamped to 1..=20)
    pub fn load_with_limit(storage: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        let limit = limit.clamp(1, HISTORY_LIMIT);
        let entries = match read_persisted(storage.as_ref(), limit) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("[History] Ignoring persisted history: {}", e);
                Vec::new()
            }
        };
        log::debug!("[History] Loaded {} entries", entries.len());

        Self {
            storage,
            limit,
            state: Mutex::new(State {
                entries,
                unsaved: false,
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Most-recent-first snapshot
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.state.lock().entries.clone()
    }

    /// Add `url` as the most recent entry, replacing any older entry for it
    pub fn record(&self, url: &str, title: &str) -> Recorded {
        let mut state = self.state.lock();

        // Another writer sharing the medium may have changed it since load
        if !state.unsaved {
            match read_persisted(self.storage.as_ref(), self.limit) {
                Ok(persisted) => state.entries = persisted,
                Err(e) => log::debug!("[History] Using in-memory history: {}", e),
            }
        }
        let entries = &mut state.entries;

        let now = Utc::now().timestamp_millis();
        let timestamp = entries.first().map_or(now, |newest| now.max(newest.timestamp));

        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: title.to_string(),
            timestamp,
        };

        entries.retain(|e| e.url != url);
        entries.insert(0, entry.clone());
        entries.truncate(self.limit);

        let warning = self.persist(entries);
        state.unsaved = warning.is_some();
        Recorded { entry, warning }
    }

    /// Empty the history, in memory and in storage. Idempotent.
    pub fn clear(&self) -> Option<PersistenceWarning> {
        let mut state = self.state.lock();
        state.entries.clear();

        match self.storage.remove(HISTORY_KEY) {
            Ok(()) => {
                state.unsaved = false;
                log::info!("[History] Cleared");
                None
            }
            Err(e) => {
                state.unsaved = true;
                log::warn!("[History] Failed to erase persisted history: {}", e);
                Some(e.into())
            }
        }
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Option<PersistenceWarning> {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                return Some(PersistenceWarning {
                    message: e.to_string(),
                })
            }
        };

        match self.storage.set(HISTORY_KEY, &json) {
            Ok(()) => None,
            Err(e) => {
                log::warn!("[History] Failed to persist history: {}", e);
                Some(e.into())
            }
        }
    }
}

#[derive(Debug)]
enum LoadError {
    Storage(String),
    Corrupt(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "storage unavailable: {}", msg),
            Self::Corrupt(msg) => write!(f, "corrupt data: {}", msg),
        }
    }
}

/// Read and sanitize the persisted list (dedup by URL, keep order, bound)
fn read_persisted(storage: &dyn KeyValueStore, limit: usize) -> Result<Vec<HistoryEntry>, LoadError> {
    let raw = match storage.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(Vec::new()),
        Err(e) => return Err(LoadError::Storage(e.to_string())),
    };

    let parsed: Vec<HistoryEntry> =
        serde_json::from_str(&raw).map_err(|e| LoadError::Corrupt(e.to_string()))?;

    let mut entries: Vec<HistoryEntry> = Vec::with_capacity(parsed.len().min(limit));
    for entry in parsed {
        if entries.len() == limit {
            break;
        }
        if !entries.iter().any(|e| e.url == entry.url) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::errors::StorageError;
    use crate::media::storage::{JsonFileStore, MemoryStore};
    use std::collections::HashSet;

    /// Store whose writes always fail
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn fresh_store_is_empty() {
        let store = HistoryStore::load(memory());
        assert!(store.list().is_empty());
        assert!(store.clear().is_none());
        assert!(store.list().is_empty());
    }

    #[test]
    fn never_duplicates_and_never_exceeds_limit() {
        let store = HistoryStore::load(memory());

        for i in 0..60 {
            let url = format!("https://example.com/v{}", i % 27);
            store.record(&url, &format!("Title {}", i));

            let list = store.list();
            assert!(list.len() <= HISTORY_LIMIT);
            let unique: HashSet<_> = list.iter().map(|e| e.url.as_str()).collect();
            assert_eq!(unique.len(), list.len());
        }
        assert_eq!(store.list().len(), HISTORY_LIMIT);
    }

    #[test]
    fn re_recording_moves_entry_to_front() {
        let store = HistoryStore::load(memory());
        let first = store.record("https://a", "Old title").entry;
        store.record("https://b", "B");
        let again = store.record("https://a", "New title").entry;

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].url, "https://a");
        assert_eq!(list[0].title, "New title");
        assert_ne!(list[0].id, first.id);
        assert!(again.timestamp >= first.timestamp);
        assert_eq!(list[1].url, "https://b");
    }

    #[test]
    fn oldest_entries_are_dropped_first() {
        let store = HistoryStore::load(memory());
        for i in 0..(HISTORY_LIMIT + 3) {
            store.record(&format!("https://example.com/{}", i), "t");
        }
        let urls: Vec<_> = store.list().into_iter().map(|e| e.url).collect();
        assert_eq!(urls.first().unwrap(), &format!("https://example.com/{}", HISTORY_LIMIT + 2));
        assert!(!urls.contains(&"https://example.com/0".to_string()));
        assert!(!urls.contains(&"https://example.com/2".to_string()));
        assert!(urls.contains(&"https://example.com/3".to_string()));
    }

    #[test]
    fn timestamps_are_non_decreasing_from_oldest_to_newest() {
        let store = HistoryStore::load(memory());
        for i in 0..10 {
            store.record(&format!("https://example.com/{}", i), "t");
        }
        let list = store.list();
        assert!(list.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn history_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));

        let store = HistoryStore::load(Arc::clone(&storage));
        store.record("https://a", "A");
        store.record("https://b", "B");
        drop(store);

        let reloaded = HistoryStore::load(storage);
        let urls: Vec<_> = reloaded.list().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
    }

    #[test]
    fn clear_erases_persisted_state() {
        let storage = memory();
        let store = HistoryStore::load(Arc::clone(&storage));
        store.record("https://a", "A");

        assert!(store.clear().is_none());
        assert!(store.list().is_empty());
        assert_eq!(storage.get(HISTORY_KEY).unwrap(), None);
        assert!(HistoryStore::load(storage).list().is_empty());
    }

    #[test]
    fn corrupt_data_loads_as_empty() {
        let storage = memory();
        storage.set(HISTORY_KEY, "{not json").unwrap();
        let store = HistoryStore::load(Arc::clone(&storage));
        assert!(store.list().is_empty());

        // The next write replaces the corrupt value
        assert!(store.record("https://a", "A").warning.is_none());
        assert_eq!(HistoryStore::load(storage).list().len(), 1);
    }

    #[test]
    fn persisted_duplicates_are_sanitized_on_load() {
        let storage = memory();
        let entry = |id: &str, url: &str| HistoryEntry {
            id: id.to_string(),
            url: url.to_string(),
            title: id.to_string(),
            timestamp: 1,
        };
        let persisted = vec![entry("1", "https://a"), entry("2", "https://a"), entry("3", "https://b")];
        storage
            .set(HISTORY_KEY, &serde_json::to_string(&persisted).unwrap())
            .unwrap();

        let ids: Vec<_> = HistoryStore::load(storage).list().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn write_failure_is_a_warning_not_an_error() {
        let store = HistoryStore::load(Arc::new(ReadOnlyStore(MemoryStore::new())));

        let recorded = store.record("https://a", "A");
        assert!(recorded.warning.unwrap().message.contains("quota exceeded"));
        assert_eq!(store.list().len(), 1);

        // Memory stays authoritative while storage lags behind
        let recorded = store.record("https://b", "B");
        assert!(recorded.warning.is_some());
        let urls: Vec<_> = store.list().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);

        assert!(store.clear().is_some());
        assert!(store.list().is_empty());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(HistoryStore::load_with_limit(memory(), 0).limit(), 1);
        assert_eq!(HistoryStore::load_with_limit(memory(), 500).limit(), HISTORY_LIMIT);
    }
}
