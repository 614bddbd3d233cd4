//! WebSocket RPC layer: pooled connections with request correlation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  round-robin  ┌──────────────────┐   text frames   ┌──────────┐
//! │  RpcClient  │ ────────────► │ Connection 0..N  │ ◄─────────────► │   peer   │
//! │  (facade)   │               │  + Correlator    │    JSON + id    │ service  │
//! └─────────────┘               └──────────────────┘                 └──────────┘
//! ```
//!
//! # Correlation
//!
//! Every request carries a `request_id`. Success responses echo it and are
//! matched by it, in any order. Error responses carry no id, so each one
//! completes the oldest call still pending on the connection it arrived on.
//!
//! # Usage
//!
//! ```ignore
//! use rowsocket::{ClientConfig, Request, RpcClient, TableProtocol};
//!
//! let config = ClientConfig::new("ws://127.0.0.1:3030").with_connection_count(4);
//! let client = RpcClient::<TableProtocol>::connect(&config).await?;
//! let result = client.call(Request::list_rows("employees")).await?;
//! ```

mod client;
mod codec;
mod connection;
mod correlator;
mod error;
mod pool;

pub use client::RpcClient;
pub use codec::{decode, encode, stamp_request_id, Decoded};
pub use connection::{Connection, ConnectionState};
pub use correlator::{Completion, Correlator};
pub use error::RpcError;
pub use pool::ConnectionPool;
