use std::sync::Arc;

use log::{info, warn};
use tokio::time::sleep;

use super::{RaftError, RaftMessage, SharedNode, VoteReplyKind};
use crate::network::{call_with_policy, NetworkError, PeerTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Quorum reached; the node is now Leader.
    Elected { term: u64, voters: Vec<String> },
    /// Every peer was contacted but too few granted.
    NotElected { term: u64, voters: Vec<String> },
    /// `peer` reported a newer term; the round was abandoned.
    SteppedDown { term: u64, peer: String },
}

impl ElectionOutcome {
    pub fn term(&self) -> u64 {
        match self {
            ElectionOutcome::Elected { term, .. }
            | ElectionOutcome::NotElected { term, .. }
            | ElectionOutcome::SteppedDown { term, .. } => *term,
        }
    }
}

/// Drives one sequential election round: peers are asked for their vote one
/// at a time, in configuration order.
pub struct ElectionCoordinator<T: PeerTransport + ?Sized> {
    node: SharedNode,
    transport: Arc<T>,
}

impl<T: PeerTransport + ?Sized> ElectionCoordinator<T> {
    pub fn new(node: SharedNode, transport: Arc<T>) -> Self {
        Self { node, transport }
    }

    pub async fn run_round(&self) -> Result<ElectionOutcome, RaftError> {
        let (peers, policy) = {
            let mut node = self.node.lock().await;
            node.begin_election_round()?;
            info!(
                "Node {} starting election at term {} ({} peers, quorum {})",
                node.id(),
                node.current_term(),
                node.peers().len(),
                node.quorum()
            );
            (node.peers().to_vec(), node.config().policy)
        };

        for (i, peer) in peers.iter().enumerate() {
            if i > 0 && !policy.pacing().is_zero() {
                sleep(policy.pacing()).await;
            }

            // The lock is never held across the network call.
            let request = self.node.lock().await.vote_request();
            let sent_term = request.term();
            let result = call_with_policy(self.transport.as_ref(), &policy, peer, request)
                .await
                .and_then(|reply| match reply {
                    RaftMessage::VoteReply { vote_granted, term } => Ok((vote_granted, term)),
                    other => Err(NetworkError::UnexpectedReply(format!("{other:?}"))),
                });

            let mut node = self.node.lock().await;
            let kind = match result {
                Ok((vote_granted, term)) => {
                    node.apply_vote_reply(peer, sent_term, vote_granted, term)
                }
                Err(e) => {
                    warn!("Vote request to {peer} failed: {e}");
                    node.apply_vote_failure(peer, sent_term)
                }
            };

            if kind == VoteReplyKind::Stale {
                return Ok(ElectionOutcome::SteppedDown {
                    term: node.current_term(),
                    peer: peer.clone(),
                });
            }
        }

        let outcome = self.node.lock().await.finish_election_round();
        Ok(outcome)
    }
}
