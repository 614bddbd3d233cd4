//! rowsocket: typed RPC over pooled WebSocket connections.
//!
//! This library provides the client side of a JSON-over-WebSocket table
//! service:
//!
//! - `models` - Request, response and error shapes on the wire
//! - `protocol` - The `Protocol` trait tying a vocabulary to the core
//! - `ipc` - Codec, correlator, connection pool and the `RpcClient` facade
//! - `config` - Client settings from defaults, environment or builders
//!
//! ```ignore
//! use rowsocket::{CallResult, ClientConfig, Request, RpcClient, TableProtocol};
//!
//! let client = RpcClient::<TableProtocol>::connect(&ClientConfig::from_env()?).await?;
//! if let CallResult::Data(rows) = client.call(Request::list_rows("albums")).await? {
//!     println!("{:?}", rows);
//! }
//! ```

pub mod config;
pub mod ipc;
pub mod models;
pub mod protocol;

pub use config::ClientConfig;
pub use ipc::{RpcClient, RpcError};
pub use models::{ErrorResponse, Request, Response};
pub use protocol::{CalculatorProtocol, CallResult, Protocol, TableProtocol};
