//! Load client for the Echo service.
//!
//! Sends a batch of concurrent Echo calls and reports how long the batch
//! took.

use clap::Parser;
use telepathy_echo::client::{self, BatchOptions};
use telepathy_echo::config::PORT_ENV;
use telepathy_echo::logging;
use tracing::info;

const DEFAULT_PORT: u16 = 50051;

#[derive(Parser, Debug)]
#[command(name = "echo-client")]
#[command(version)]
#[command(about = "Send a batch of Echo calls to a telepathy-echo server", long_about = None)]
struct Args {
    /// Server URI (defaults to 127.0.0.1 on TELEPATHY_SVC_PORT, or 50051)
    #[arg(short, long)]
    addr: Option<String>,

    /// Message to echo
    #[arg(short, long, default_value = "hello")]
    message: String,

    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 10)]
    requests: usize,

    /// Server-side delay per request in milliseconds
    #[arg(short, long, default_value_t = 0)]
    time_ms: i32,

    /// Bytes of padding sent with each request
    #[arg(short, long, default_value_t = 0)]
    size_byte: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn default_addr() -> String {
    let port = std::env::var(PORT_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    format!("http://127.0.0.1:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let addr = args.addr.unwrap_or_else(default_addr);
    let options = BatchOptions {
        message: args.message,
        requests: args.requests,
        delay_ms: args.time_ms,
        payload_size: args.size_byte,
    };

    info!(%addr, requests = options.requests, delay_ms = options.delay_ms, "Sending batch");

    let echo = client::connect(addr).await?;
    let report = client::run_batch(&echo, &options).await?;

    for (index, message) in report.replies.iter().enumerate() {
        info!(index, %message, "Reply");
    }
    info!(
        requests = report.replies.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Batch complete"
    );

    Ok(())
}
