//! # Intake Scheduler
//!
//! Delayed status-transition scheduler: applications that enter the
//! `submitted` status are automatically moved to `completed` after a
//! configurable delay, unless an operator resolves or deletes them first.
//!
//! ## Architecture
//! ```text
//! gateway handlers ──register/unregister──▶ PendingRegistry (id → due-time)
//!                                               ▲        │ due_entries(now)
//!                                               │        ▼
//! recovery loader ──re-seed on startup──────────┘   Poll Loop (tokio tick)
//!                                                        │
//!                                                        ▼
//!                                             TransitionExecutor
//!                                               ├── ApplicationStore (fetch/update)
//!                                               └── StatusNotifier  (broadcast)
//! ```
//!
//! The registry is a cache of intent; the database stays authoritative. The
//! executor re-validates the stored status right before every transition,
//! so manual changes and deletions that race a poll cycle win.

pub mod collab;
pub mod executor;
pub mod poll;
pub mod recovery;
pub mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use collab::{ApplicationStore, NotifyError, StatusNotifier};
pub use executor::TransitionExecutor;
pub use intake_core::config::SchedulerConfig;
pub use registry::PendingRegistry;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// The scheduler facade wired into the gateway.
///
/// `register`/`unregister` are total: they never fail and never block on a
/// collaborator. All storage access happens inside the poll cycle.
pub struct StatusScheduler {
    registry: Arc<PendingRegistry>,
    executor: TransitionExecutor,
    store: Arc<dyn ApplicationStore>,
    config: SchedulerConfig,
}

impl StatusScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn ApplicationStore>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        let registry = Arc::new(PendingRegistry::new());
        let executor = TransitionExecutor::new(
            registry.clone(),
            store.clone(),
            notifier,
            std::time::Duration::from_secs(config.retry_secs),
        );
        Self {
            registry,
            executor,
            store,
            config,
        }
    }

    /// Track a newly submitted application for automatic completion after
    /// the configured pending delay. Re-registering resets the timer.
    pub fn register(&self, id: i64) {
        self.register_after(id, std::time::Duration::from_secs(self.config.pending_secs));
    }

    /// Track an application with an explicit delay.
    pub fn register_after(&self, id: i64, delay: std::time::Duration) {
        let delay = Duration::from_std(delay)
            .unwrap_or_else(|_| Duration::seconds(self.config.pending_secs as i64));
        let due_at = Utc::now() + delay;
        self.registry.register(id, due_at);
        tracing::info!("📅 Application {id} registered for auto-completion at {due_at}");
    }

    /// Stop tracking an application (manual status change or deletion).
    /// Unknown ids are a no-op; the return value is for logging only.
    pub fn unregister(&self, id: i64) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            tracing::info!("Application {id} unregistered from auto-completion");
        }
        removed
    }

    /// Rebuild the registry from storage. Call once at startup, before
    /// serving traffic and before spawning the poll loop.
    pub async fn recover_pending(&self) -> usize {
        recovery::recover_pending(
            self.store.as_ref(),
            &self.registry,
            std::time::Duration::from_secs(self.config.recovery_offset_secs),
        )
        .await
    }

    /// One poll cycle: snapshot due entries and execute their transitions.
    pub async fn run_cycle(&self, now: DateTime<Utc>) {
        let due = self.registry.due_entries(now);
        if due.is_empty() {
            return;
        }
        tracing::info!("Processing {} application(s) due for auto-completion", due.len());
        self.executor.run_due(&due, now).await;
    }

    /// Spawn the background poll loop. Fire `shutdown.notify_one()` to stop.
    pub fn spawn(self: Arc<Self>, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let interval = std::time::Duration::from_secs(self.config.check_interval_secs);
        poll::spawn_poll_loop(self, interval, shutdown)
    }

    /// Whether an id is currently tracked (telemetry + tests).
    pub fn is_pending(&self, id: i64) -> bool {
        self.registry.contains(id)
    }

    /// Number of tracked entries.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{submitted_app, MockNotifier, MockStore};
    use intake_store::ApplicationStatus;

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig {
            pending_secs: 60,
            check_interval_secs: 10,
            retry_secs: 30,
            recovery_offset_secs: 10,
        }
    }

    fn make_scheduler(store: Arc<MockStore>) -> (StatusScheduler, Arc<MockNotifier>) {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = StatusScheduler::new(quick_config(), store, notifier.clone());
        (scheduler, notifier)
    }

    #[tokio::test]
    async fn test_registered_application_completes_after_delay() {
        let store = Arc::new(MockStore::new());
        store.insert(submitted_app(1));
        let (scheduler, notifier) = make_scheduler(store.clone());

        scheduler.register(1);

        // Not yet due: nothing happens on an early cycle
        scheduler.run_cycle(Utc::now()).await;
        assert_eq!(store.get(1).unwrap().status, ApplicationStatus::Submitted);
        assert!(scheduler.is_pending(1));

        // One cycle past the delay completes it
        scheduler.run_cycle(Utc::now() + Duration::seconds(61)).await;
        assert_eq!(store.get(1).unwrap().status, ApplicationStatus::Completed);
        assert_eq!(notifier.sent().len(), 1);
        assert!(!scheduler.is_pending(1));
    }

    #[tokio::test]
    async fn test_unregister_before_due_prevents_transition() {
        let store = Arc::new(MockStore::new());
        store.insert(submitted_app(1));
        let (scheduler, notifier) = make_scheduler(store.clone());

        scheduler.register(1);
        assert!(scheduler.unregister(1));

        scheduler.run_cycle(Utc::now() + Duration::seconds(120)).await;

        assert_eq!(store.get(1).unwrap().status, ApplicationStatus::Submitted);
        assert!(notifier.sent().is_empty());
        assert!(!scheduler.is_pending(1));
    }

    #[tokio::test]
    async fn test_unregister_unknown_id_is_noop() {
        let store = Arc::new(MockStore::new());
        let (scheduler, _) = make_scheduler(store);
        assert!(!scheduler.unregister(99));
        assert!(!scheduler.unregister(99));
    }

    #[tokio::test]
    async fn test_reregister_resets_timer() {
        let store = Arc::new(MockStore::new());
        store.insert(submitted_app(1));
        let (scheduler, _) = make_scheduler(store.clone());

        scheduler.register(1);
        scheduler.register(1);
        assert_eq!(scheduler.pending_count(), 1);

        // Exactly one transition happens once due
        scheduler.run_cycle(Utc::now() + Duration::seconds(61)).await;
        assert_eq!(store.get(1).unwrap().status, ApplicationStatus::Completed);
        assert!(!scheduler.is_pending(1));
    }

    #[tokio::test]
    async fn test_recovery_roundtrip() {
        let store = Arc::new(MockStore::new());
        for id in [1, 2, 3] {
            store.insert(submitted_app(id));
        }
        for id in [10, 11] {
            let mut app = submitted_app(id);
            app.status = ApplicationStatus::Completed;
            store.insert(app);
        }
        let (scheduler, _) = make_scheduler(store);

        let recovered = scheduler.recover_pending().await;

        assert_eq!(recovered, 3);
        assert_eq!(scheduler.pending_count(), 3);
        for id in [1, 2, 3] {
            assert!(scheduler.is_pending(id));
        }
    }
}
