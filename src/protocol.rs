//! Wire formats for the push channel and the control endpoint.
//!
//! ## Push channel (JSON text frames, server → client)
//!
//! | `type`          | Extra fields                                              |
//! |-----------------|-----------------------------------------------------------|
//! | `update`        | `is_running`, `current_count`, `target_count`             |
//! | `status`        | same as `update` (reply to a status request)              |
//! | `no_more_users` | same as `update`, plus optional `message`                 |
//! | `ping`          | none — answered with [`PONG`]                             |
//!
//! Client → server frames are bare text, not JSON: [`STATUS_REQUEST`] and
//! [`PONG`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::status::JobStatus;

/// Asks the backend to push its current status.
pub const STATUS_REQUEST: &str = "status";
/// Liveness reply to an inbound `ping`.
pub const PONG: &str = "pong";

/// A decoded push-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `update` or `status`: a full status snapshot.
    StatusUpdate(JobStatus),
    /// `no_more_users`: the backend ran out of eligible targets. The message
    /// is optional on the wire.
    NoMoreTargets(JobStatus, Option<String>),
    /// Application-level ping; must be answered with [`PONG`].
    Ping,
}

/// Decode one inbound text frame.
///
/// Returns `Ok(None)` for well-formed frames of a type this client does not
/// handle, and [`ClientError::Protocol`] for anything that is not valid JSON
/// or is missing required fields.
pub fn parse_inbound(text: &str) -> Result<Option<InboundEvent>, ClientError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ClientError::Protocol(e.to_string()))?;
    let msg_type = value["type"]
        .as_str()
        .ok_or_else(|| ClientError::Protocol("missing \"type\" field".into()))?;

    let event = match msg_type {
        "update" | "status" => InboundEvent::StatusUpdate(job_status(&value)?),
        "no_more_users" => {
            let message = value["message"].as_str().map(String::from);
            InboundEvent::NoMoreTargets(job_status(&value)?, message)
        }
        "ping" => InboundEvent::Ping,
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn job_status(value: &Value) -> Result<JobStatus, ClientError> {
    JobStatus::deserialize(value).map_err(|e| ClientError::Protocol(e.to_string()))
}

/// `POST /api/start` request body.
#[derive(Debug, Serialize)]
pub struct StartRequest {
    pub target_count: u32,
}

/// Error body returned by the control endpoint on rejection.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
}
