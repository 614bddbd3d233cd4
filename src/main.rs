//! rowsocket - send table service requests from the command line.
//!
//! Requests are JSON objects given as arguments, or one per line on stdin.
//! They are sent concurrently over a pooled client and each answer is
//! printed as one JSON line, in input order.

use std::io;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::future::join_all;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rowsocket::config::{DEFAULT_CONNECTION_COUNT, DEFAULT_TIMEOUT_SECS, DEFAULT_URL};
use rowsocket::{ClientConfig, Request, RpcClient, TableProtocol};

#[derive(Debug, Parser)]
#[command(version, about = "Send requests to a table service over pooled WebSockets")]
struct Args {
    /// Peer WebSocket URL.
    #[arg(short, long, env = "ROWSOCKET_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Number of connections to open.
    #[arg(short, long, env = "ROWSOCKET_CONNECTIONS", default_value_t = DEFAULT_CONNECTION_COUNT)]
    connections: usize,

    /// Per-call timeout in seconds.
    #[arg(short, long, env = "ROWSOCKET_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Requests as JSON, e.g. '{"type":"ListRows","table":"albums"}'.
    /// Read from stdin, one per line, when omitted.
    requests: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results only.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rowsocket=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let args = Args::parse();
    tracing::debug!("parsed command line arguments: {args:?}");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, abandoning in-flight requests");
            bail!("interrupted");
        }
        result = run(args) => result,
    }
}

async fn run(args: Args) -> Result<()> {
    let raw = if args.requests.is_empty() {
        read_lines(BufReader::new(tokio::io::stdin())).await?
    } else {
        args.requests
    };
    let requests = parse_requests(&raw)?;
    if requests.is_empty() {
        tracing::warn!("No requests given");
        return Ok(());
    }

    let config = ClientConfig::new(args.url)
        .with_connection_count(args.connections)
        .with_timeout(Duration::from_secs(args.timeout));
    let client = RpcClient::<TableProtocol>::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.url))?;

    let failures = send_all(&client, requests).await?;
    if failures > 0 {
        bail!("{} request(s) failed locally", failures);
    }
    Ok(())
}

/// Collect the non-blank lines of `reader`.
async fn read_lines<R: AsyncBufRead + Unpin>(reader: R) -> Result<Vec<String>> {
    let mut lines = reader.lines();
    let mut collected = Vec::new();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if !line.trim().is_empty() {
            collected.push(line);
        }
    }
    Ok(collected)
}

fn parse_requests(raw: &[String]) -> Result<Vec<Request>> {
    raw.iter()
        .enumerate()
        .map(|(i, text)| {
            serde_json::from_str(text)
                .with_context(|| format!("Request #{} is not a valid request: {}", i + 1, text))
        })
        .collect()
}

/// Issue every request concurrently and print the answers in input order.
/// Returns the number of local failures.
async fn send_all(client: &RpcClient, requests: Vec<Request>) -> Result<usize> {
    let results = join_all(requests.into_iter().map(|request| client.call(request))).await;

    let mut failures = 0;
    for result in results {
        let line = match result {
            Ok(answer) => serde_json::to_string(&answer),
            Err(e) => {
                failures += 1;
                serde_json::to_string(&json!({ "local_error": e.to_string() }))
            }
        }
        .context("Failed to serialize result")?;
        println!("{}", line);
    }
    Ok(failures)
}
