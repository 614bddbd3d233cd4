//! RPC client facade over a pool of WebSocket connections.

use std::time::Duration;

use tracing::debug;

use super::codec::stamp_request_id;
use super::error::RpcError;
use super::pool::ConnectionPool;
use crate::config::{ClientConfig, DEFAULT_TIMEOUT_SECS};
use crate::protocol::{CallResultOf, Protocol, TableProtocol};

/// RPC client for a table service (or any other [`Protocol`]).
///
/// Calls are spread across the pool round-robin. Each call waits for its own
/// answer, so many calls may be in flight at once from different tasks.
///
/// # Example
///
/// ```ignore
/// use rowsocket::{CallResult, ClientConfig, Request, RpcClient};
///
/// let client = RpcClient::connect(&ClientConfig::new("ws://127.0.0.1:3030")).await?;
///
/// match client.call(Request::get_row("employees", 1)).await? {
///     CallResult::Data(response) => println!("{:?}", response),
///     CallResult::Error(error) => eprintln!("peer refused: {:?}", error),
/// }
/// ```
pub struct RpcClient<P: Protocol = TableProtocol> {
    pool: ConnectionPool<P>,
    timeout: Duration,
}

impl<P: Protocol> RpcClient<P> {
    /// Validate `config` and open its connection pool. The call timeout also
    /// bounds each connection's handshake.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` for unusable settings,
    /// `RpcError::ConnectionFailed` if any connection could not be opened, or
    /// `RpcError::Timeout` if a handshake stalled.
    pub async fn connect(config: &ClientConfig) -> Result<Self, RpcError> {
        config.validate()?;
        let pool =
            ConnectionPool::open(&config.url, config.connection_count, config.timeout).await?;
        Ok(Self {
            pool,
            timeout: config.timeout,
        })
    }

    /// Build a client over an existing pool with the default timeout.
    pub fn from_pool(pool: ConnectionPool<P>) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the call timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pool(&self) -> &ConnectionPool<P> {
        &self.pool
    }

    /// Send `request` and wait for the peer's answer.
    ///
    /// A missing `request_id` is filled with a fresh UUID. Calls are never
    /// retried; to retry, issue a new request with a new id.
    ///
    /// # Errors
    ///
    /// Only local failures are errors (`PoolNotInitialized`,
    /// `DuplicateRequestId`, `ConnectionClosed`, `Timeout`, `Protocol`).
    /// Failures reported by the peer come back as `CallResult::Error`.
    pub async fn call(&self, mut request: P::Request) -> Result<CallResultOf<P>, RpcError> {
        let request_id = stamp_request_id::<P>(&mut request);
        let connection = self.pool.next_connection()?;
        debug!(
            connection = connection.index(),
            request_id = %request_id,
            "Routing call"
        );
        connection.send(&request, self.timeout).await
    }
}
