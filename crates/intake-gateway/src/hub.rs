//! Event hub — broadcasts application status changes to WebSocket clients.
//!
//! A `tokio::sync::broadcast` channel: the scheduler and the manual-update
//! route publish, each connected socket holds a receiver. Slow clients lag
//! and skip events rather than blocking publishers.

use async_trait::async_trait;
use tokio::sync::broadcast;

use intake_scheduler::{NotifyError, StatusNotifier};
use intake_store::Application;

/// A status-change event pushed to subscribers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusEvent {
    pub application: Application,
}

/// Broadcast hub for status-change events.
pub struct EventHub {
    tx: broadcast::Sender<StatusEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Subscribe a new client.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Publish a status change. A send with zero subscribers is normal.
    pub fn publish(&self, app: &Application) {
        let receivers = self
            .tx
            .send(StatusEvent {
                application: app.clone(),
            })
            .unwrap_or(0);
        tracing::debug!(
            "Status event for application {} sent to {receivers} subscriber(s)",
            app.id
        );
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusNotifier for EventHub {
    async fn notify(&self, app: &Application) -> Result<(), NotifyError> {
        self.publish(app);
        Ok(())
    }
}
