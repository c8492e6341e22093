//! Error taxonomy for the status client.
//!
//! Nothing here is fatal: validation errors are reported to the caller before
//! any network traffic, command errors leave the local status untouched, and
//! transport/protocol errors are absorbed by the connection task (logged,
//! retried, or dropped).

use thiserror::Error;

/// Errors produced by [`CommandClient`](crate::client::CommandClient) and the
/// push-channel parser.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad user input (non-positive or non-numeric target count). Never sent
    /// to the network.
    #[error("{0}")]
    Validation(String),
    /// The control endpoint rejected the command or could not be reached.
    /// `status` is `None` when the request never got an HTTP response.
    #[error("{message}")]
    Command {
        status: Option<u16>,
        message: String,
    },
    /// The push channel failed to open, stalled in its handshake, or
    /// dropped. The connection task retries these and publishes their text in
    /// [`ConnectionStatus::last_error`](crate::connection::ConnectionStatus::last_error).
    /// Also used when the HTTP client cannot be built.
    #[error("transport error: {0}")]
    Transport(String),
    /// An inbound push frame could not be parsed.
    #[error("malformed push frame: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Returns `true` for errors caused by local input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// HTTP status of a rejected command, if the endpoint answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Command { status, .. } => *status,
            _ => None,
        }
    }
}

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
