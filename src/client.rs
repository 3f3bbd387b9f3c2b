//! Batch client for the Echo service.
//!
//! Fires a configurable number of Echo calls at once over a single channel
//! and collects the replies in request order.

use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tonic::transport::Channel;
use tonic::Status;
use tracing::debug;

use crate::proto::echo_client::EchoClient;
use crate::proto::EchoRequest;

/// Parameters for one batch of Echo calls.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub message: String,
    pub requests: usize,
    pub delay_ms: i32,
    /// Size of the padding sent with each request.
    pub payload_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            message: "hello".to_string(),
            requests: 10,
            delay_ms: 0,
            payload_size: 0,
        }
    }
}

/// Outcome of a batch.
#[derive(Debug)]
pub struct BatchReport {
    /// Reply messages, indexed like the requests that produced them.
    pub replies: Vec<String>,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("request {index} failed: {status}")]
    Rpc { index: usize, status: Status },
    #[error("request task failed: {0}")]
    Join(#[from] JoinError),
}

/// Connect to an Echo server at `addr` (e.g. `http://127.0.0.1:50051`).
pub async fn connect(addr: String) -> Result<EchoClient<Channel>, ClientError> {
    Ok(EchoClient::connect(addr).await?)
}

/// Send `options.requests` calls concurrently and wait for all replies.
pub async fn run_batch(
    client: &EchoClient<Channel>,
    options: &BatchOptions,
) -> Result<BatchReport, ClientError> {
    let payload = Bytes::from(vec![0u8; options.payload_size]);
    let start = Instant::now();
    let mut calls = JoinSet::new();

    for index in 0..options.requests {
        let mut client = client.clone();
        let request = EchoRequest {
            message: options.message.clone(),
            delay_time: options.delay_ms,
            dummy_data: payload.clone(),
        };
        calls.spawn(async move { (index, client.echo(request).await) });
    }

    let mut replies = vec![String::new(); options.requests];
    while let Some(joined) = calls.join_next().await {
        let (index, result) = joined?;
        let reply = result.map_err(|status| ClientError::Rpc { index, status })?;
        debug!(index, message = %reply.get_ref().message, "Echo reply");
        replies[index] = reply.into_inner().message;
    }

    Ok(BatchReport {
        replies,
        elapsed: start.elapsed(),
    })
}
