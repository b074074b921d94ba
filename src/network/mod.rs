use log::warn;
use tokio::time::{sleep, timeout};

use crate::raft::{CallPolicy, RaftMessage};

mod error;

pub mod client;
pub mod server;

pub use client::{GrpcTransport, RaftClient};
pub use error::NetworkError;
pub use server::{bind, serve, RaftServer};

pub mod proto {
    tonic::include_proto!("raft");
}

/// Outbound half of the RPC surface: deliver one request to a peer and
/// return its reply.
#[tonic::async_trait]
pub trait PeerTransport: Send + Sync {
    async fn call(&self, peer: &str, message: RaftMessage) -> Result<RaftMessage, NetworkError>;
}

/// Runs one peer call under `policy`: each attempt is bounded by the
/// timeout, and retryable failures are retried up to `max_retries` times
/// with exponential backoff.
pub async fn call_with_policy<T: PeerTransport + ?Sized>(
    transport: &T,
    policy: &CallPolicy,
    peer: &str,
    message: RaftMessage,
) -> Result<RaftMessage, NetworkError> {
    let mut attempt: u32 = 0;

    loop {
        let result = match timeout(policy.timeout(), transport.call(peer, message.clone())).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::TimeoutError),
        };

        match result {
            Ok(reply) => return Ok(reply),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let backoff = policy.backoff_for(attempt);
                warn!(
                    "Call to {peer} failed ({e}); retry {attempt}/{} in {backoff:?}",
                    policy.max_retries
                );
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
