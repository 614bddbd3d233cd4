//! Fixed-size pool of connections with round-robin selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::try_join_all;
use tracing::info;

use super::connection::{Connection, ConnectionState};
use super::error::RpcError;
use crate::protocol::Protocol;

/// An ordered set of connections to one peer.
///
/// The pool is never resized or repaired. A connection that closes stays in
/// rotation and fails the calls routed to it.
pub struct ConnectionPool<P: Protocol> {
    connections: Vec<Connection<P>>,
    /// Always a valid index into `connections` (or zero when empty).
    cursor: AtomicUsize,
}

impl<P: Protocol> ConnectionPool<P> {
    /// Open `connection_count` connections to `url` concurrently.
    ///
    /// Returns only once every connection is ready. If any connection fails,
    /// the whole open fails and the connections that did succeed are closed.
    /// Each handshake is bounded by `connect_timeout`.
    ///
    /// # Errors
    ///
    /// - `RpcError::InvalidConfig` if `connection_count` is zero
    /// - `RpcError::ConnectionFailed` for the first connection that failed
    /// - `RpcError::Timeout` if a handshake did not complete in time
    pub async fn open(
        url: &str,
        connection_count: usize,
        connect_timeout: Duration,
    ) -> Result<Self, RpcError> {
        if connection_count == 0 {
            return Err(RpcError::InvalidConfig(
                "connection count must be at least 1".to_string(),
            ));
        }

        let connections = try_join_all(
            (0..connection_count).map(|index| Connection::connect(url, index, connect_timeout)),
        )
        .await?;

        info!("Opened {} connection(s) to {}", connections.len(), url);
        Ok(Self::from_connections(connections))
    }

    /// Build a pool from connections that are already established.
    pub fn from_connections(connections: Vec<Connection<P>>) -> Self {
        Self {
            connections,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Return the connection at the cursor and advance the cursor, wrapping.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::PoolNotInitialized` if the pool has no connections.
    pub fn next_connection(&self) -> Result<&Connection<P>, RpcError> {
        let len = self.connections.len();
        if len == 0 {
            return Err(RpcError::PoolNotInitialized);
        }

        let index = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cursor| {
                Some((cursor + 1) % len)
            })
            .unwrap_or_else(|current| current);

        Ok(&self.connections[index])
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of connections not yet closed.
    pub async fn open_connections(&self) -> usize {
        let mut open = 0;
        for connection in &self.connections {
            if connection.state().await == ConnectionState::Ready {
                open += 1;
            }
        }
        open
    }
}
