//! Bounded search history
//!
//! Most-recent-first, no duplicates, at most [`MAX_HISTORY`] entries.
//! Persistence goes through an injected [`HistoryStore`].

use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};

pub const MAX_HISTORY: usize = 30;

/// How many entries the search box suggests
pub const SUGGESTION_COUNT: usize = 8;

/// Persistence backend for the history list
pub trait HistoryStore: Send + Sync {
    fn load_history(&self) -> Result<Vec<String>>;
    fn save_history(&self, entries: &[String]) -> Result<()>;
    fn clear_history(&self) -> Result<()>;
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn persisted(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load_history(&self) -> Result<Vec<String>> {
        Ok(self.persisted())
    }

    fn save_history(&self, entries: &[String]) -> Result<()> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }

    fn clear_history(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Move `query` to the front, dropping any older copy, and cap the length
fn promote(entries: &mut Vec<String>, query: &str) {
    entries.retain(|e| e != query);
    entries.insert(0, query.to_string());
    entries.truncate(MAX_HISTORY);
}

/// Restore the invariants on a list read back from storage
fn sanitize(raw: Vec<String>) -> Vec<String> {
    let mut entries: Vec<String> = Vec::with_capacity(raw.len().min(MAX_HISTORY));
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() || entries.iter().any(|e| e == entry) {
            continue;
        }
        entries.push(entry.to_string());
        if entries.len() == MAX_HISTORY {
            break;
        }
    }
    entries
}

pub struct QueryHistory {
    store: Arc<dyn HistoryStore>,
    entries: Mutex<Vec<String>>,
}

impl QueryHistory {
    /// Load once from the store; an unreadable store starts empty
    pub fn load(store: Arc<dyn HistoryStore>) -> Self {
        let entries = match store.load_history() {
            Ok(raw) => sanitize(raw),
            Err(e) => {
                log::warn!("Failed to load search history, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// Record a successful query and persist the list
    pub fn push(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let snapshot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            promote(&mut entries, query);
            entries.clone()
        };

        if let Err(e) = self.store.save_history(&snapshot) {
            log::warn!("Failed to persist search history: {}", e);
        }
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        if let Err(e) = self.store.clear_history() {
            log::warn!("Failed to clear persisted search history: {}", e);
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn recent(&self, n: usize) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .take(n)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
