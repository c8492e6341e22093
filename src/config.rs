//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `AUTOFOLLOW_HOST`, `AUTOFOLLOW_PORT`,
//!    `AUTOFOLLOW_LOG`
//! 2. **Config file** — path via `--config <path>`, or `autofollow.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [backend]
//! host = "127.0.0.1"
//! port = 8000
//! secure = false          # https:// + wss:// instead of http:// + ws://
//! ws_path = "/ws"
//!
//! [connection]
//! reconnect_delay_ms = 3000
//! status_request_delay_ms = 100
//! handshake_timeout_ms = 10000
//!
//! [http]
//! connect_timeout_secs = 10
//! timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "autofollow.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the backend lives. One host/port serves both the control endpoint
/// and the push channel.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use TLS for both surfaces (default false).
    #[serde(default)]
    pub secure: bool,
    /// Path of the push-channel endpoint (default `/ws`).
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

/// Push-channel timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Delay before reopening a closed channel (default 3000).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Settle time between the handshake and the first status request
    /// (default 100).
    #[serde(default = "default_status_request_delay_ms")]
    pub status_request_delay_ms: u64,
    /// Limit on the WebSocket handshake before the attempt counts as failed
    /// (default 10000).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Control endpoint transport limits.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_ws_path() -> String {
    "/ws".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_status_request_delay_ms() -> u64 {
    100
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secure: false,
            ws_path: default_ws_path(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            status_request_delay_ms: default_status_request_delay_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BackendConfig {
    /// Base URL of the control endpoint, without trailing slash.
    pub fn api_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Full URL of the push channel.
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.ws_path)
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn status_request_delay(&self) -> Duration {
        Duration::from_millis(self.status_request_delay_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `autofollow.toml`
    /// in the current directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    fn apply_env_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("AUTOFOLLOW_HOST") {
            self.backend.host = host;
        }
        if let Some(port) = var("AUTOFOLLOW_PORT") {
            self.backend.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("AUTOFOLLOW_PORT={port} is not a port")))?;
        }
        if let Some(level) = var("AUTOFOLLOW_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.host.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.host is empty".into()));
        }
        if self.backend.port == 0 {
            return Err(ConfigError::Invalid("backend.port must be non-zero".into()));
        }
        if self.connection.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connection.handshake_timeout_ms must be non-zero".into(),
            ));
        }
        if !self.backend.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "backend.ws_path must start with '/', got {:?}",
                self.backend.ws_path
            )));
        }
        Ok(())
    }
}
