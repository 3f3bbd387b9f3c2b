//! telepathy-echo server binary
//!
//! Reads the port from `TELEPATHY_SVC_PORT`, serves the Echo gRPC service on
//! `0.0.0.0:<port>` and runs until SIGINT or SIGTERM.

use std::process::ExitCode;
use telepathy_echo::config::Config;
use telepathy_echo::logging;
use telepathy_echo::server::Server;
use tracing::{error, info};

fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telepathy-echo: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_level);

    info!(
        port = config.port,
        workers = config.workers,
        max_concurrent_requests = config.max_concurrent_requests,
        "Starting telepathy-echo server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .thread_name("echo-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(Server::new(config).run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
