//! Client facade tying the four components together.
//!
//! A [`FollowClient`] lives for as long as the user interface does: it starts
//! the push channel on construction, exposes the current status,
//! notification and connection state, and forwards start/stop to the
//! command client. Nothing survives [`FollowClient::shutdown`]; a new client
//! starts again from the zero status.

use tokio::sync::watch;
use tracing::info;

use crate::client::{CommandClient, CommandOutcome};
use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionStatus, PushDispatcher};
use crate::error::ClientError;
use crate::notify::{Notification, NotificationController};
use crate::status::{JobStatus, StatusSnapshot, StatusStore};

pub struct FollowClient {
    store: StatusStore,
    notifications: NotificationController,
    commands: CommandClient,
    connection: ConnectionManager,
}

impl FollowClient {
    /// Build the client and start connecting the push channel.
    ///
    /// Only fails if the HTTP client cannot be constructed; an unreachable
    /// backend is retried in the background.
    pub fn start(config: &Config) -> Result<Self, ClientError> {
        let store = StatusStore::new();
        let notifications = NotificationController::new(store.clone());
        let commands =
            CommandClient::new(&config.backend.api_base(), &config.http, store.clone())?;
        let dispatcher = PushDispatcher::new(store.clone(), notifications.clone());
        let ws_url = config.backend.ws_url();
        info!("push channel {ws_url}, control endpoint {}", commands.base_url());
        let connection = ConnectionManager::connect(ws_url, config.connection.clone(), dispatcher);

        Ok(Self {
            store,
            notifications,
            commands,
            connection,
        })
    }

    pub fn status(&self) -> JobStatus {
        self.store.current()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.store.subscribe()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    pub fn notification(&self) -> Option<Notification> {
        self.notifications.current()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>> {
        self.notifications.subscribe()
    }

    pub fn dismiss_notification(&self) -> bool {
        self.notifications.dismiss()
    }

    pub async fn start_job(&self, target_count: u32) -> Result<CommandOutcome, ClientError> {
        self.commands.start(target_count).await
    }

    /// Start from raw user input (validated locally first).
    pub async fn start_job_from_input(&self, input: &str) -> Result<CommandOutcome, ClientError> {
        self.commands.start_from_input(input).await
    }

    pub async fn stop_job(&self) -> Result<CommandOutcome, ClientError> {
        self.commands.stop().await
    }

    pub fn reconnect(&self) {
        self.connection.reconnect();
    }

    /// Close the push channel and cancel its timers.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
        info!("client shut down");
    }
}
