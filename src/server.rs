//! gRPC server hosting the Echo service.
//!
//! Binds a plaintext listener, serves until a shutdown signal arrives and
//! then lets in-flight calls finish before returning.

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};

use crate::config::Config;
use crate::service::EchoService;

/// Server instance
pub struct Server {
    config: Config,
    service: EchoService,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let service = EchoService::new(config.max_concurrent_requests);
        Server { config, service }
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr().ok();
        info!(
            address = ?local_addr,
            max_concurrent_requests = self.config.max_concurrent_requests,
            "Server listening"
        );

        tonic::transport::Server::builder()
            .add_service(self.service.into_server())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves when the process is asked to terminate.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Fatal server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::echo_client::EchoClient;
    use crate::proto::EchoRequest;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tonic::transport::Channel;
    use tonic::Code;

    struct TestServer {
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<Result<(), ServerError>>,
    }

    impl TestServer {
        async fn start(max_concurrent_requests: usize) -> Self {
            let config = Config {
                port: 50051,
                workers: 10,
                max_concurrent_requests,
                log_level: "info".to_string(),
            };
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (shutdown, rx) = oneshot::channel::<()>();

            let handle = tokio::spawn(Server::new(config).serve(listener, async {
                let _ = rx.await;
            }));

            TestServer {
                addr,
                shutdown,
                handle,
            }
        }

        async fn client(&self) -> EchoClient<Channel> {
            EchoClient::connect(format!("http://{}", self.addr))
                .await
                .unwrap()
        }

        async fn stop(self) {
            self.shutdown.send(()).unwrap();
            self.handle.await.unwrap().unwrap();
        }
    }

    fn request(message: &str, delay_time: i32) -> EchoRequest {
        EchoRequest {
            message: message.to_string(),
            delay_time,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_echo_end_to_end() {
        let server = TestServer::start(10).await;
        let mut client = server.client().await;

        let start = Instant::now();
        let reply = client.echo(request("world", 100)).await.unwrap();

        assert_eq!(reply.into_inner().message, "hello world");
        assert!(start.elapsed() >= Duration::from_millis(100));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_empty_message_end_to_end() {
        let server = TestServer::start(10).await;
        let mut client = server.client().await;

        let reply = client.echo(request("", 0)).await.unwrap();
        assert_eq!(reply.into_inner().message, "hello ");

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_take_max_delay() {
        let server = TestServer::start(10).await;
        let client = server.client().await;

        let delays = [300, 400, 500, 600];
        let start = Instant::now();

        let calls: Vec<_> = delays
            .iter()
            .map(|&delay| {
                let mut client = client.clone();
                tokio::spawn(async move { client.echo(request("x", delay)).await })
            })
            .collect();

        for call in calls {
            let reply = call.await.unwrap().unwrap();
            assert_eq!(reply.into_inner().message, "hello x");
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_negative_delay_is_invalid_argument() {
        let server = TestServer::start(10).await;
        let mut client = server.client().await;

        let status = client.echo(request("late", -1)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_call_does_not_affect_others() {
        // Two slots: one for the sibling, one that only the aborted call
        // can hand back to the follow-up call.
        let server = TestServer::start(2).await;
        let client = server.client().await;

        let mut sibling_client = client.clone();
        let sibling =
            tokio::spawn(async move { sibling_client.echo(request("sibling", 1500)).await });

        let mut slow_client = client.clone();
        let slow = tokio::spawn(async move { slow_client.echo(request("slow", 60_000)).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        slow.abort();
        assert!(slow.await.unwrap_err().is_cancelled());

        let mut client = client;
        let reply = tokio::time::timeout(
            Duration::from_secs(1),
            client.echo(request("fast", 0)),
        )
        .await
        .expect("aborted call kept its slot")
        .unwrap();
        assert_eq!(reply.into_inner().message, "hello fast");
        assert!(!sibling.is_finished());

        let reply = sibling.await.unwrap().unwrap();
        assert_eq!(reply.into_inner().message, "hello sibling");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_error_reported() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = Config {
            port,
            workers: 1,
            max_concurrent_requests: 1,
            log_level: "info".to_string(),
        };

        let err = Server::new(config).run().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
