//! A single WebSocket connection with its own correlator.
//!
//! The stream is split into a reader task, which feeds every inbound frame to
//! the correlator, and a writer task, which drains an unbounded queue of
//! outbound frames. When either side fails the correlator is closed and all
//! calls still waiting on this connection fail with
//! `RpcError::ConnectionClosed`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use super::codec::encode;
use super::correlator::{Completion, Correlator};
use super::error::RpcError;
use crate::protocol::{CallResultOf, Protocol};

/// How long the writer waits for the peer to answer our close frame before
/// tearing the reader down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Observable lifecycle of a connection handed out by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Ready,
    Closed,
}

pub struct Connection<P: Protocol> {
    index: usize,
    correlator: Arc<Mutex<Correlator<P>>>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl<P: Protocol> Connection<P> {
    /// Open a WebSocket to `url` and start its reader and writer tasks.
    ///
    /// Returns once the handshake has completed.
    ///
    /// # Errors
    ///
    /// - `RpcError::ConnectionFailed` if the TCP connection or the WebSocket
    ///   handshake fails
    /// - `RpcError::Timeout` if the handshake does not finish within
    ///   `connect_timeout`
    pub async fn connect(url: &str, index: usize, connect_timeout: Duration) -> Result<Self, RpcError> {
        let (ws_stream, _response) = timeout(connect_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| {
                warn!(connection = index, "Handshake with {} timed out", url);
                RpcError::Timeout(connect_timeout)
            })?
            .map_err(|e| RpcError::connection_failed(url, e))?;

        info!(connection = index, "Connected to {}", url);
        Ok(Self::from_stream(ws_stream, index))
    }

    /// Wrap an already-established WebSocket stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, index: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let correlator = Arc::new(Mutex::new(Correlator::new(index)));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (write, read) = ws_stream.split();

        let reader = tokio::spawn(read_loop(read, Arc::clone(&correlator), index));
        tokio::spawn(write_loop(write, outbound_rx, reader, Arc::clone(&correlator), index));

        Self {
            index,
            correlator,
            outbound,
        }
    }

    /// Position of this connection in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub async fn state(&self) -> ConnectionState {
        if self.correlator.lock().await.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Ready
        }
    }

    /// Number of calls on this connection still waiting for an answer.
    pub async fn pending_calls(&self) -> usize {
        self.correlator.lock().await.pending_count()
    }

    /// Send a stamped request and wait up to `wait` for its answer.
    ///
    /// Registration and queueing happen under the correlator lock, so the
    /// answer cannot be processed before the call is registered.
    ///
    /// # Errors
    ///
    /// - `RpcError::MissingRequestId` if the request has no id
    /// - `RpcError::DuplicateRequestId` if the id is in flight here
    /// - `RpcError::ConnectionClosed` if the connection is or becomes closed
    /// - `RpcError::Timeout` if no answer arrives in time
    pub async fn send(
        &self,
        request: &P::Request,
        wait: Duration,
    ) -> Result<CallResultOf<P>, RpcError> {
        let request_id = match P::request_id(request) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(RpcError::MissingRequestId),
        };
        let frame = encode::<P>(request)?;

        let mut pending = {
            let mut correlator = self.correlator.lock().await;
            let answer = correlator.register(&request_id)?;
            if self.outbound.send(frame).is_err() {
                correlator.cancel(&request_id);
                return Err(RpcError::ConnectionClosed);
            }
            PendingGuard {
                correlator: Arc::clone(&self.correlator),
                answer: Some(answer),
                armed: true,
            }
        };
        debug!(connection = self.index, request_id = %request_id, "Request sent");

        let Some(answer) = pending.answer.as_mut() else {
            return Err(RpcError::ConnectionClosed);
        };
        let outcome = timeout(wait, answer).await;
        pending.disarm();

        match outcome {
            Ok(Ok(completion)) => completion,
            // Sender dropped without answering.
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => {
                self.correlator.lock().await.cancel(&request_id);
                warn!(
                    connection = self.index,
                    request_id = %request_id,
                    "Request timed out after {:?}", wait
                );
                Err(RpcError::Timeout(wait))
            }
        }
    }
}

/// Owns the receiver of a registered call. If the waiting future is dropped
/// before the call resolves, the abandoned entry is removed from the
/// correlator.
struct PendingGuard<P: Protocol> {
    correlator: Arc<Mutex<Correlator<P>>>,
    answer: Option<oneshot::Receiver<Completion<P>>>,
    armed: bool,
}

impl<P: Protocol> PendingGuard<P> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<P: Protocol> Drop for PendingGuard<P> {
    fn drop(&mut self) {
        // The receiver must be gone before the sweep so this call counts as
        // abandoned.
        drop(self.answer.take());
        if !self.armed {
            return;
        }

        if let Ok(mut correlator) = self.correlator.try_lock() {
            correlator.remove_abandoned();
            return;
        }
        let correlator = Arc::clone(&self.correlator);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                correlator.lock().await.remove_abandoned();
            });
        }
    }
}

async fn read_loop<P, S>(
    mut read: SplitStream<WebSocketStream<S>>,
    correlator: Arc<Mutex<Correlator<P>>>,
    index: usize,
) where
    P: Protocol,
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => correlator.lock().await.on_frame(text.as_str()),
            Ok(Message::Binary(_)) => correlator.lock().await.on_binary_frame(),
            Ok(Message::Close(frame)) => {
                info!(connection = index, ?frame, "Peer closed the connection");
                break;
            }
            // Ping/pong are answered by tungstenite.
            Ok(_) => {}
            Err(e) => {
                warn!(connection = index, "WebSocket error: {}", e);
                break;
            }
        }
    }

    correlator.lock().await.close();
    info!(connection = index, "Connection closed");
}

async fn write_loop<P, S>(
    mut write: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut reader: JoinHandle<()>,
    correlator: Arc<Mutex<Correlator<P>>>,
    index: usize,
) where
    P: Protocol,
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write.send(message).await {
            warn!(connection = index, "Failed to send frame: {}", e);
            correlator.lock().await.close();
            return;
        }
    }

    // Every handle to this connection is gone.
    if let Err(e) = write.send(Message::Close(None)).await {
        debug!(connection = index, "Close frame not sent: {}", e);
    }

    // The reader exits when the peer echoes the close. Do not wait on a peer
    // that never does.
    if timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
        debug!(connection = index, "Peer did not answer close, stopping reader");
        reader.abort();
    }
}
