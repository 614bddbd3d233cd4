use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Local failures of the RPC layer.
///
/// Errors reported by the peer are not represented here; they arrive as the
/// `error` branch of [`crate::CallResult`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// A connection could not be established or completed its handshake.
    #[error("Connection to {url} failed: {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The connection closed before the call was answered.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No connections are available to route a call to.
    #[error("Connection pool is not initialized")]
    PoolNotInitialized,

    /// Client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A call with this identifier is still pending on the connection.
    #[error("Request id {0:?} is already in flight on this connection")]
    DuplicateRequestId(String),

    /// The request reached the codec without an identifier.
    #[error("Request has no request_id")]
    MissingRequestId,

    /// No answer arrived within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Encoding failure on the outbound path.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl RpcError {
    pub(crate) fn connection_failed(url: &str, err: tungstenite::Error) -> Self {
        RpcError::ConnectionFailed {
            url: url.to_string(),
            source: Box::new(err),
        }
    }
}
