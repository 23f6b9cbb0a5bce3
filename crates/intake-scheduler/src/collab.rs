//! Collaborator seams consumed by the scheduler.
//!
//! The scheduler never owns storage or the notification transport — it calls
//! through these narrow traits. The gateway wires in the SQLite store and
//! the WebSocket event hub; tests wire in mocks.

use async_trait::async_trait;
use intake_store::{Application, IntakeDb, StoreError};

/// Persistence handle used by the executor and the recovery loader.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Fetch an application by id. `Ok(None)` means not found.
    async fn fetch(&self, id: i64) -> Result<Option<Application>, StoreError>;

    /// Persist an updated application. `Ok(false)` means the row no longer
    /// exists.
    async fn update(&self, app: &Application) -> Result<bool, StoreError>;

    /// All applications — used only by the recovery loader at startup.
    async fn list_all(&self) -> Result<Vec<Application>, StoreError>;
}

/// Fire-and-forget broadcast of a status change to interested subscribers.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, app: &Application) -> Result<(), NotifyError>;
}

/// Errors from the notification transport. Never fatal to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),
}

// The SQLite store is synchronous; statements are short enough to run inline
// on the async executor, matching how the gateway calls it from handlers.
#[async_trait]
impl ApplicationStore for IntakeDb {
    async fn fetch(&self, id: i64) -> Result<Option<Application>, StoreError> {
        self.get_application(id)
    }

    async fn update(&self, app: &Application) -> Result<bool, StoreError> {
        self.update_application(app)
    }

    async fn list_all(&self) -> Result<Vec<Application>, StoreError> {
        self.list_applications()
    }
}
