//! Pending registry — the shared map of application id → due-time.
//!
//! This is the only state shared between request handlers and the poll loop.
//! The mutex is held for single map operations only, never across a
//! collaborator call, so readers and writers cannot starve each other.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Thread-safe map of pending application ids to their due-times.
pub struct PendingRegistry {
    entries: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or overwrite an entry. Re-registering resets the timer.
    pub fn register(&self, id: i64, due_at: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("registry lock");
        entries.insert(id, due_at);
    }

    /// Remove an entry if present. Returns whether something was removed —
    /// callers use this for logging only, never for control flow.
    pub fn unregister(&self, id: i64) -> bool {
        let mut entries = self.entries.lock().expect("registry lock");
        entries.remove(&id).is_some()
    }

    /// Point-in-time snapshot of ids whose due-time has passed.
    /// Collected under a single lock acquisition: concurrent inserts during
    /// the scan are not included and concurrent removals are not
    /// double-reported.
    pub fn due_entries(&self, now: DateTime<Utc>) -> Vec<i64> {
        let entries = self.entries.lock().expect("registry lock");
        let mut due: Vec<i64> = entries
            .iter()
            .filter(|(_, due_at)| **due_at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();
        due
    }

    /// Due-time for a single entry, if registered.
    pub fn due_at(&self, id: i64) -> Option<DateTime<Utc>> {
        let entries = self.entries.lock().expect("registry lock");
        entries.get(&id).copied()
    }

    /// Whether an entry is currently registered.
    pub fn contains(&self, id: i64) -> bool {
        let entries = self.entries.lock().expect("registry lock");
        entries.contains_key(&id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("registry lock");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
