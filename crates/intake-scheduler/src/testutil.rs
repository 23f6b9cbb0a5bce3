//! Shared test doubles for the scheduler's collaborator seams.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use intake_store::{Application, ApplicationKind, ApplicationStatus, StoreError};

use crate::collab::{ApplicationStore, NotifyError, StatusNotifier};

/// A submitted application with the given id.
pub fn submitted_app(id: i64) -> Application {
    Application {
        id,
        date: Utc::now(),
        kind: ApplicationKind::Request,
        status: ApplicationStatus::Submitted,
        message: format!("application {id}"),
        user_id: 1,
    }
}

/// In-memory store with failure injection.
pub struct MockStore {
    apps: Mutex<HashMap<i64, Application>>,
    failing_updates: AtomicU32,
    fail_list: AtomicBool,
    vanish_on_update: AtomicBool,
    update_calls: AtomicU32,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            apps: Mutex::new(HashMap::new()),
            failing_updates: AtomicU32::new(0),
            fail_list: AtomicBool::new(false),
            vanish_on_update: AtomicBool::new(false),
            update_calls: AtomicU32::new(0),
        }
    }

    pub fn insert(&self, app: Application) {
        self.apps.lock().unwrap().insert(app.id, app);
    }

    pub fn get(&self, id: i64) -> Option<Application> {
        self.apps.lock().unwrap().get(&id).cloned()
    }

    /// Make the next `n` update calls fail with a database error.
    pub fn fail_updates(&self, n: u32) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    /// Make `list_all` fail (recovery-failure tests).
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Make updates report zero affected rows, as if the row was deleted.
    pub fn vanish_on_update(&self, vanish: bool) {
        self.vanish_on_update.store(vanish, Ordering::SeqCst);
    }

    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    // Any StoreError works as the injected transient failure; the executor
    // treats them all identically.
    fn db_error() -> StoreError {
        StoreError::Lock
    }
}

#[async_trait]
impl ApplicationStore for MockStore {
    async fn fetch(&self, id: i64) -> Result<Option<Application>, StoreError> {
        Ok(self.get(id))
    }

    async fn update(&self, app: &Application) -> Result<bool, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_updates.load(Ordering::SeqCst) > 0 {
            self.failing_updates.fetch_sub(1, Ordering::SeqCst);
            return Err(Self::db_error());
        }
        if self.vanish_on_update.load(Ordering::SeqCst) {
            self.apps.lock().unwrap().remove(&app.id);
            return Ok(false);
        }
        let mut apps = self.apps.lock().unwrap();
        match apps.get_mut(&app.id) {
            Some(stored) => {
                *stored = app.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_all(&self) -> Result<Vec<Application>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::db_error());
        }
        let mut apps: Vec<Application> = self.apps.lock().unwrap().values().cloned().collect();
        apps.sort_by_key(|a| a.id);
        Ok(apps)
    }
}

/// Notifier that records every broadcast.
pub struct MockNotifier {
    events: Mutex<Vec<Application>>,
    failing: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// A notifier whose transport always errors.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Application> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusNotifier for MockNotifier {
    async fn notify(&self, app: &Application) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Transport("mock transport down".into()));
        }
        self.events.lock().unwrap().push(app.clone());
        Ok(())
    }
}
