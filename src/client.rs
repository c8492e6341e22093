//! HTTP client for the backend's control endpoint.
//!
//! [`CommandClient`] wraps `reqwest::Client` and exposes the two commands the
//! backend accepts:
//!
//! | Method | Path         | Body                     |
//! |--------|--------------|--------------------------|
//! | POST   | `/api/start` | `{"target_count": <n>}`  |
//! | POST   | `/api/stop`  | none                     |
//!
//! Commands never touch the push channel and work while it is down. When the
//! backend accepts a command, the predicted status is written to the
//! [`StatusStore`] as an optimistic update; the next push frame replaces it.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for a `detail` field in the JSON body. If it
//! is absent (or the body is not JSON), a generic per-command message is
//! used instead. Rejected commands leave the status untouched.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::ClientError;
use crate::protocol::{ErrorBody, StartRequest};
use crate::status::{JobStatus, StatusSource, StatusStore};

const START_FAILED: &str = "Failed to start";
const STOP_FAILED: &str = "Failed to stop";
const INVALID_TARGET: &str = "Enter a valid number greater than 0.";

/// Outcome of an accepted command: the status the client now predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub accepted: bool,
    pub predicted: JobStatus,
    /// Whether `predicted` carries real counts. A stop issued before any
    /// status was received only knows the job is no longer running.
    pub counts_known: bool,
}

/// HTTP client for the start/stop control endpoint.
#[derive(Clone)]
pub struct CommandClient {
    http: reqwest::Client,
    base_url: String,
    store: StatusStore,
}

impl CommandClient {
    /// Create a client for the control endpoint at `base_url`.
    pub fn new(base_url: &str, http: &HttpConfig, store: StatusStore) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http: client,
            // Strip trailing slash for consistent URL construction
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    /// The control endpoint's base URL (without trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Parse user-entered text and start the job.
    ///
    /// Anything that is not a positive integer fails with
    /// [`ClientError::Validation`] before any request is made.
    pub async fn start_from_input(&self, input: &str) -> Result<CommandOutcome, ClientError> {
        let target_count = parse_target_count(input)?;
        self.start(target_count).await
    }

    /// `POST /api/start`: start following until `target_count` is reached.
    pub async fn start(&self, target_count: u32) -> Result<CommandOutcome, ClientError> {
        if target_count == 0 {
            return Err(ClientError::Validation(INVALID_TARGET.into()));
        }

        let resp = self
            .http
            .post(format!("{}/api/start", self.base_url))
            .json(&StartRequest { target_count })
            .send()
            .await
            .map_err(|e| transport_failure(START_FAILED, &e))?;
        let body = Self::handle_response(resp, START_FAILED).await?;
        info!("start accepted (target {target_count}): {body}");

        let predicted = JobStatus::started(target_count);
        self.store.apply_optimistic(predicted);
        Ok(CommandOutcome {
            accepted: true,
            predicted,
            counts_known: true,
        })
    }

    /// `POST /api/stop`: stop the running job.
    pub async fn stop(&self) -> Result<CommandOutcome, ClientError> {
        let resp = self
            .http
            .post(format!("{}/api/stop", self.base_url))
            .send()
            .await
            .map_err(|e| transport_failure(STOP_FAILED, &e))?;
        let body = Self::handle_response(resp, STOP_FAILED).await?;
        info!("stop accepted: {body}");

        // Predict from whatever is current when the response lands, so counts
        // pushed while the request was in flight are kept.
        let basis = self.store.snapshot();
        let predicted = basis.status.stopped();
        self.store.apply_optimistic(predicted);
        Ok(CommandOutcome {
            accepted: true,
            predicted,
            counts_known: basis.source != StatusSource::Initial,
        })
    }

    /// Check an HTTP response. Returns the (possibly empty) body on 2xx, or
    /// a [`ClientError::Command`] carrying the backend's `detail` otherwise.
    async fn handle_response(
        resp: reqwest::Response,
        fallback: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_failure(fallback, &e))?;

        if status.is_success() {
            // The body is informational only; a 2xx is an accept either way.
            Ok(serde_json::from_str(&body).unwrap_or_else(|_| {
                debug!("non-JSON success body: {body:?}");
                serde_json::Value::Null
            }))
        } else {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| fallback.to_string());
            warn!("command rejected (HTTP {}): {message}", status.as_u16());
            Err(ClientError::Command {
                status: Some(status.as_u16()),
                message,
            })
        }
    }
}

/// Parse a user-entered target count. Surrounding whitespace is ignored.
pub fn parse_target_count(input: &str) -> Result<u32, ClientError> {
    match input.trim().parse::<i64>() {
        Ok(n) if n > 0 => {
            u32::try_from(n).map_err(|_| ClientError::Validation(INVALID_TARGET.into()))
        }
        _ => Err(ClientError::Validation(INVALID_TARGET.into())),
    }
}

fn transport_failure(fallback: &str, err: &reqwest::Error) -> ClientError {
    warn!("{fallback}: {err}");
    ClientError::Command {
        status: None,
        message: format!("{fallback}: {err}"),
    }
}
