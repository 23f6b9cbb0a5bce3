//! Startup recovery — rebuilds the pending registry from persistent storage.
//!
//! After a restart the in-memory registry is empty but the database may hold
//! applications still in the submitted status. Those are re-seeded with a
//! short flat offset so the first poll cycles drain them without a startup
//! burst at t=0.

use chrono::{Duration, Utc};

use intake_store::ApplicationStatus;

use crate::collab::ApplicationStore;
use crate::registry::PendingRegistry;

/// Scan storage and re-register every submitted application.
/// Returns how many entries were recovered. Collaborator failures are logged
/// and downgraded to "nothing recovered" — startup must not be blocked.
pub async fn recover_pending(
    store: &dyn ApplicationStore,
    registry: &PendingRegistry,
    offset: std::time::Duration,
) -> usize {
    let apps = match store.list_all().await {
        Ok(apps) => apps,
        Err(e) => {
            tracing::warn!("Recovery scan failed: {e} — starting with an empty registry");
            return 0;
        }
    };

    let offset = Duration::from_std(offset).unwrap_or_else(|_| Duration::seconds(10));
    let due_at = Utc::now() + offset;
    let mut recovered = 0;
    for app in apps {
        if app.status == ApplicationStatus::Submitted {
            registry.register(app.id, due_at);
            recovered += 1;
        }
    }

    if recovered > 0 {
        tracing::info!(
            "🔄 Recovered {recovered} submitted application(s), due in {}s",
            offset.num_seconds()
        );
    }
    recovered
}
