#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! # autofollow-ctl
//!
//! Client for a remote auto-follow job. The backend runs the job; this crate
//! keeps a local view of its status in sync and sends start/stop commands.
//!
//! Status reaches the client from three places, reconciled last-write-wins:
//!
//! 1. **Push channel** — WebSocket snapshots from the backend (authoritative)
//! 2. **Optimistic predictions** — written when a command is accepted
//! 3. **Command responses** — accept/reject of start and stop
//!
//! ## Backend surface
//!
//! | Method | Path         | Description                              |
//! |--------|--------------|------------------------------------------|
//! | GET    | `/ws`        | Push channel (status frames, pings)      |
//! | POST   | `/api/start` | Start following up to `target_count`     |
//! | POST   | `/api/stop`  | Stop the running job                     |
//!
//! ## Architecture
//!
//! ```text
//! main.rs        — CLI entry point (watch / start / stop / console)
//! config.rs      — TOML + env-var configuration
//! error.rs       — ClientError / ConfigError
//! protocol.rs    — push frame parsing, control endpoint bodies
//! status.rs      — JobStatus, StatusStore (single writer point)
//! notify.rs      — NotificationController ("no more users" notices)
//! connection.rs  — ConnectionManager: push channel, state machine, reconnect
//! client.rs      — CommandClient: start/stop over HTTP
//! session.rs     — FollowClient facade wiring it all together
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod status;

pub use client::{CommandClient, CommandOutcome};
pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, PushDispatcher};
pub use error::{ClientError, ConfigError};
pub use notify::{Notification, NotificationController, DEFAULT_NO_MORE_TARGETS_MESSAGE};
pub use protocol::InboundEvent;
pub use session::FollowClient;
pub use status::{JobStatus, StatusSnapshot, StatusSource, StatusStore};
