//! Echo service handler.
//!
//! Each call waits `delay_time` milliseconds on the tokio timer and then
//! replies with `"hello "` followed by the request message. The wait only
//! suspends the calling task, so sibling calls keep running on the same
//! workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tonic::{Request, Response, Status};
use tracing::{debug, trace};

use crate::proto::echo_server::{Echo, EchoServer};
use crate::proto::{EchoReply, EchoRequest};

/// Prefix prepended to every echoed message.
pub const GREETING: &str = "hello ";

/// The `Echo` gRPC service.
#[derive(Debug, Clone)]
pub struct EchoService {
    slots: Arc<Semaphore>,
}

impl EchoService {
    /// Create a service that handles at most `max_concurrent_requests`
    /// calls at once. Extra calls wait for a free slot.
    pub fn new(max_concurrent_requests: usize) -> Self {
        EchoService {
            slots: Arc::new(Semaphore::new(max_concurrent_requests)),
        }
    }

    /// Wrap the service for registration with a tonic router.
    pub fn into_server(self) -> EchoServer<Self> {
        EchoServer::new(self)
    }

    /// Number of calls that could start right now without waiting.
    #[cfg(test)]
    pub(crate) fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

/// Build the reply text for a request message.
pub fn greet(message: &str) -> String {
    let mut reply = String::with_capacity(GREETING.len() + message.len());
    reply.push_str(GREETING);
    reply.push_str(message);
    reply
}

/// Convert the wire delay to a duration. Negative delays are rejected.
fn delay_from_millis(delay_time: i32) -> Result<Duration, Status> {
    u64::try_from(delay_time)
        .map(Duration::from_millis)
        .map_err(|_| {
            Status::invalid_argument(format!(
                "delay_time must be non-negative, got {delay_time}"
            ))
        })
}

/// Logs when a call is dropped before it produced a reply, which is how
/// tonic surfaces a client cancelling or disconnecting. Covers both the
/// wait for a slot and the delay itself.
struct InFlight {
    delay: Duration,
    finished: bool,
}

impl InFlight {
    fn new(delay: Duration) -> Self {
        InFlight {
            delay,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            debug!(delay_ms = self.delay.as_millis() as u64, "Echo call cancelled");
        }
    }
}

#[tonic::async_trait]
impl Echo for EchoService {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoReply>, Status> {
        let peer = request.remote_addr();
        let request = request.into_inner();
        let delay = delay_from_millis(request.delay_time)?;

        let in_flight = InFlight::new(delay);
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Status::unavailable("echo service is shutting down"))?;

        debug!(
            peer = ?peer,
            delay_ms = request.delay_time,
            message_len = request.message.len(),
            payload_len = request.dummy_data.len(),
            "Echo call"
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        in_flight.finish();

        let reply = EchoReply {
            message: greet(&request.message),
        };
        trace!(reply = %reply.message, "Echo reply");

        Ok(Response::new(reply))
    }
}
