//! Background poll loop — ticks the scheduler until told to stop.
//!
//! One long-lived tokio task. The shutdown signal is a `Notify` handle
//! (`notify_one` stores a permit), so a stop requested mid-cycle is picked
//! up at the next suspension point and a stop requested mid-sleep
//! interrupts the sleep instead of waiting it out.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::StatusScheduler;

/// Spawn the poll loop. Each tick processes one cycle of due entries and
/// awaits their completion before sleeping again.
pub fn spawn_poll_loop(
    scheduler: Arc<StatusScheduler>,
    interval: std::time::Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "⏰ Status scheduler started (check every {}s)",
            interval.as_secs()
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    scheduler.run_cycle(Utc::now()).await;
                }
                _ = shutdown.notified() => {
                    tracing::info!("Status scheduler stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{submitted_app, MockNotifier, MockStore};
    use crate::SchedulerConfig;
    use intake_store::ApplicationStatus;

    fn scheduler_with(
        store: Arc<MockStore>,
        notifier: Arc<MockNotifier>,
        config: SchedulerConfig,
    ) -> Arc<StatusScheduler> {
        Arc::new(StatusScheduler::new(config, store, notifier))
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let scheduler = scheduler_with(
            Arc::new(MockStore::new()),
            Arc::new(MockNotifier::new()),
            SchedulerConfig::default(),
        );
        let shutdown = Arc::new(Notify::new());
        let handle = spawn_poll_loop(
            scheduler,
            std::time::Duration::from_secs(3600),
            shutdown.clone(),
        );

        // Let the loop reach its first sleep, then cancel mid-sleep.
        tokio::task::yield_now().await;
        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_completes_due_application() {
        let store = Arc::new(MockStore::new());
        let notifier = Arc::new(MockNotifier::new());
        store.insert(submitted_app(1));

        let config = SchedulerConfig {
            pending_secs: 0,
            check_interval_secs: 1,
            ..SchedulerConfig::default()
        };
        let scheduler = scheduler_with(store.clone(), notifier.clone(), config);
        scheduler.register(1);

        let shutdown = Arc::new(Notify::new());
        let handle = spawn_poll_loop(
            scheduler,
            std::time::Duration::from_secs(1),
            shutdown.clone(),
        );

        // Paused clock auto-advances while the loop sleeps; the first ticks
        // pick up the already-due entry.
        for _ in 0..50 {
            if store.get(1).unwrap().status == ApplicationStatus::Completed {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert_eq!(store.get(1).unwrap().status, ApplicationStatus::Completed);
        assert_eq!(notifier.sent().len(), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }
}
