use std::sync::Arc;

use log::{info, warn};

use super::{RaftMessage, SharedNode};
use crate::network::{call_with_policy, NetworkError, PeerTransport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub term: u64,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Sends one informational message to every peer, in order. A failed peer is
/// logged and skipped; repeated broadcasts are fully independent.
pub struct MessageBroadcaster<T: PeerTransport + ?Sized> {
    node: SharedNode,
    transport: Arc<T>,
}

impl<T: PeerTransport + ?Sized> MessageBroadcaster<T> {
    pub fn new(node: SharedNode, transport: Arc<T>) -> Self {
        Self { node, transport }
    }

    pub async fn broadcast_once(&self) -> BroadcastReport {
        let (peers, policy) = {
            let node = self.node.lock().await;
            (node.peers().to_vec(), node.config().policy)
        };

        let mut report = BroadcastReport::default();

        for peer in &peers {
            let message = self.node.lock().await.outbound_message();
            let sent_term = message.term();
            let result = call_with_policy(self.transport.as_ref(), &policy, peer, message)
                .await
                .and_then(|reply| match reply {
                    RaftMessage::MessageReply { term } => Ok(term),
                    other => Err(NetworkError::UnexpectedReply(format!("{other:?}"))),
                });

            let mut node = self.node.lock().await;
            match result {
                Ok(term) => {
                    node.apply_message_reply(peer, sent_term, term);
                    info!("Sent message to {peer}; my term is now {}", node.current_term());
                    report.delivered.push(peer.clone());
                }
                Err(e) => {
                    warn!("Message to {peer} failed: {e}");
                    node.apply_message_failure(peer, sent_term);
                    report.failed.push(peer.clone());
                }
            }
        }

        report.term = self.node.lock().await.current_term();
        report
    }
}
