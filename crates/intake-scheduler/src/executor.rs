//! Transition executor — applies the submitted → completed transition for
//! due entries.
//!
//! Persistence is authoritative: every execution re-validates the stored
//! status before touching anything, so a manual status change or deletion
//! that raced the poll cycle is silently discarded.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use intake_store::ApplicationStatus;

use crate::collab::{ApplicationStore, StatusNotifier};
use crate::registry::PendingRegistry;

/// Executes status transitions for due applications.
pub struct TransitionExecutor {
    registry: Arc<PendingRegistry>,
    store: Arc<dyn ApplicationStore>,
    notifier: Arc<dyn StatusNotifier>,
    /// Reschedule delay after a failed attempt. Kept much shorter than the
    /// pending delay so failures are retried promptly.
    retry_delay: Duration,
}

impl TransitionExecutor {
    pub fn new(
        registry: Arc<PendingRegistry>,
        store: Arc<dyn ApplicationStore>,
        notifier: Arc<dyn StatusNotifier>,
        retry_delay: std::time::Duration,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
            retry_delay: Duration::from_std(retry_delay).unwrap_or_else(|_| Duration::seconds(30)),
        }
    }

    /// Process one poll cycle's worth of due entries, sequentially.
    /// Completions are awaited here so a cycle never outlives its memory.
    pub async fn run_due(&self, ids: &[i64], now: DateTime<Utc>) {
        for &id in ids {
            self.execute(id, now).await;
        }
    }

    /// Run the transition for a single application id.
    async fn execute(&self, id: i64, now: DateTime<Utc>) {
        // Drop the entry first — an overrunning cycle must not dispatch the
        // same id again on the next tick.
        self.registry.unregister(id);

        let app = match self.store.fetch(id).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                tracing::debug!("Application {id} no longer exists, skipping transition");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch application {id}: {e} — retrying in {}s",
                    self.retry_delay.num_seconds()
                );
                self.registry.register(id, now + self.retry_delay);
                return;
            }
        };

        // Another actor resolved it while we waited — expected, not an error.
        if app.status != ApplicationStatus::Submitted {
            tracing::debug!(
                "Application {id} is already '{}', skipping transition",
                app.status
            );
            return;
        }

        let mut app = app;
        app.status = ApplicationStatus::Completed;

        match self.store.update(&app).await {
            Ok(true) => {
                tracing::info!("✅ Application {id} auto-completed");
                // The transition is already persisted; a lost notification is
                // accepted (at-most-once delivery).
                if let Err(e) = self.notifier.notify(&app).await {
                    tracing::warn!("Failed to notify status change for application {id}: {e}");
                }
            }
            Ok(false) => {
                tracing::debug!("Application {id} deleted during transition, skipping");
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to update application {id}: {e} — retrying in {}s",
                    self.retry_delay.num_seconds()
                );
                self.registry.register(id, now + self.retry_delay);
            }
        }
    }
}
