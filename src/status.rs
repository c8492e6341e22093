//! Local view of the remote job status.
//!
//! [`StatusStore`] is the only place a [`JobStatus`] is ever written. Two
//! sources feed it:
//!
//! - **Push** — full-state snapshots from the push channel. Always ground
//!   truth, always overwrite.
//! - **Optimistic** — predictions written by the command client right after
//!   the control endpoint accepts a start/stop, so displays react before the
//!   backend's next push arrives.
//!
//! Both are applied last-write-wins by arrival order. Push frames are
//! idempotent snapshots rather than deltas, so no merge is needed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Snapshot of the remote follow job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub is_running: bool,
    pub current_count: u32,
    pub target_count: u32,
}

impl JobStatus {
    /// Status predicted right after the backend accepts `start(target_count)`.
    pub fn started(target_count: u32) -> Self {
        Self {
            is_running: true,
            current_count: 0,
            target_count,
        }
    }

    /// Same counters, with the job no longer running.
    pub fn stopped(self) -> Self {
        Self {
            is_running: false,
            ..self
        }
    }

    /// Completion percentage rounded to the nearest integer, 0 when no target
    /// is set.
    pub fn progress_percent(&self) -> u32 {
        if self.target_count == 0 {
            return 0;
        }
        let pct = f64::from(self.current_count) / f64::from(self.target_count) * 100.0;
        pct.round() as u32
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.current_count,
            self.target_count,
            if self.is_running { "running" } else { "idle" }
        )
    }
}

/// Where the currently held status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Zero state at client start, nothing received yet.
    Initial,
    /// Pushed by the backend.
    Push,
    /// Predicted locally after a command was accepted.
    Optimistic,
}

/// A status value together with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub source: StatusSource,
}

/// Single authority for the local [`JobStatus`].
///
/// Cheap to clone; all clones share the same value. Readers either poll
/// [`current`](Self::current) or hold a [`watch::Receiver`] from
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct StatusStore {
    tx: Arc<watch::Sender<StatusSnapshot>>,
}

impl StatusStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StatusSnapshot {
            status: JobStatus::default(),
            source: StatusSource::Initial,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Overwrite with a pushed snapshot, unconditionally.
    pub fn apply_push(&self, status: JobStatus) {
        self.write(status, StatusSource::Push);
    }

    /// Overwrite with a locally predicted status. The next push replaces it.
    pub fn apply_optimistic(&self, status: JobStatus) {
        self.write(status, StatusSource::Optimistic);
    }

    /// The status as currently displayed.
    pub fn current(&self) -> JobStatus {
        self.tx.borrow().status
    }

    /// The current status along with its source.
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    fn write(&self, status: JobStatus, source: StatusSource) {
        let previous = self.tx.send_replace(StatusSnapshot { status, source });
        debug!("status {source:?}: {} -> {status}", previous.status);
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}
