//! User-facing notifications derived from push events.
//!
//! Currently a single kind: the backend reporting it has no more accounts to
//! follow. The notification stays raised until the user dismisses it;
//! dismissing never touches the job status.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::status::{JobStatus, StatusStore};

/// Shown when a `no_more_users` frame carries no message of its own.
pub const DEFAULT_NO_MORE_TARGETS_MESSAGE: &str = "No more accounts available to follow.";

/// A raised notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Increments with every raise, starting at 1.
    pub id: u64,
    pub message: String,
}

/// Turns `no_more_users` events into a status write plus a one-shot
/// notification.
#[derive(Clone)]
pub struct NotificationController {
    store: StatusStore,
    current: Arc<watch::Sender<Option<Notification>>>,
    raised: Arc<AtomicU64>,
}

impl NotificationController {
    pub fn new(store: StatusStore) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            store,
            current: Arc::new(tx),
            raised: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle a `no_more_users` event: apply its status as a push and raise a
    /// notification.
    pub fn on_no_more_targets(&self, status: JobStatus, message: Option<String>) {
        self.store.apply_push(status);

        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_NO_MORE_TARGETS_MESSAGE.to_string());
        let id = self.raised.fetch_add(1, Ordering::SeqCst) + 1;
        info!("notification #{id}: {message}");
        self.current.send_replace(Some(Notification { id, message }));
    }

    /// The notification awaiting dismissal, if any.
    pub fn current(&self) -> Option<Notification> {
        self.current.borrow().clone()
    }

    /// Clear the raised notification. Returns `false` if none was raised.
    pub fn dismiss(&self) -> bool {
        self.current.send_replace(None).is_some()
    }

    /// Total notifications raised since the client started.
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.current.subscribe()
    }
}
