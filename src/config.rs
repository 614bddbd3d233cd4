//! Client configuration.
//!
//! Resolution order for each setting:
//! 1. Explicit builder call / CLI flag
//! 2. Environment variable (`ROWSOCKET_URL`, `ROWSOCKET_CONNECTIONS`,
//!    `ROWSOCKET_TIMEOUT_SECS`)
//! 3. Built-in default

use std::time::Duration;

use url::Url;

use crate::ipc::RpcError;

/// Default peer address.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:3030";

/// Default number of pooled connections.
pub const DEFAULT_CONNECTION_COUNT: usize = 10;

/// Default call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const URL_ENV: &str = "ROWSOCKET_URL";
pub const CONNECTIONS_ENV: &str = "ROWSOCKET_CONNECTIONS";
pub const TIMEOUT_ENV: &str = "ROWSOCKET_TIMEOUT_SECS";

/// Settings consumed by [`crate::RpcClient::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Peer WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Number of connections, fixed for the client's lifetime.
    pub connection_count: usize,
    /// Upper bound on how long a call waits for its answer.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connection_count: DEFAULT_CONNECTION_COUNT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    /// Defaults overridden by any `ROWSOCKET_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, RpcError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RpcError> {
        let mut config = Self::default();

        if let Some(url) = lookup(URL_ENV) {
            config.url = url;
        }
        if let Some(count) = lookup(CONNECTIONS_ENV) {
            config.connection_count = count.trim().parse().map_err(|e| {
                RpcError::InvalidConfig(format!("{}={:?}: {}", CONNECTIONS_ENV, count, e))
            })?;
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                RpcError::InvalidConfig(format!("{}={:?}: {}", TIMEOUT_ENV, secs, e))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_connection_count(mut self, connection_count: usize) -> Self {
        self.connection_count = connection_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the settings before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` if:
    /// - The URL does not parse or its scheme is not `ws`/`wss`
    /// - The connection count is zero
    /// - The timeout is zero
    pub fn validate(&self) -> Result<(), RpcError> {
        let url = Url::parse(&self.url)
            .map_err(|e| RpcError::InvalidConfig(format!("invalid url {:?}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RpcError::InvalidConfig(format!(
                "url scheme must be ws or wss, got {:?}",
                url.scheme()
            )));
        }
        if self.connection_count == 0 {
            return Err(RpcError::InvalidConfig(
                "connection count must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(RpcError::InvalidConfig("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
