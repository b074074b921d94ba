use std::sync::Arc;

use log::{debug, info, warn};

use super::{ElectionOutcome, NodeRole, NodeState, RaftConfig, RaftError, RaftMessage};
use crate::audit::{AuditEvent, AuditSink, Decision, Direction, EventKind};

/// How a single vote request ended, from the candidate's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteReplyKind {
    Granted,
    Rejected,
    /// The peer reported a term ahead of ours once the reply was counted.
    Stale,
}

pub struct RaftNode {
    state: NodeState,
    config: RaftConfig,
    audit: Arc<dyn AuditSink>,
}

impl RaftNode {
    pub fn new(
        config: RaftConfig,
        role: NodeRole,
        initial_term: u64,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            state: NodeState::new(config.node_id, role, initial_term),
            config,
            audit,
        }
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn id(&self) -> u64 {
        self.state.node_id
    }

    pub fn role(&self) -> NodeRole {
        self.state.role
    }

    pub fn current_term(&self) -> u64 {
        self.state.current_term
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state.role, NodeRole::Leader)
    }

    pub fn peers(&self) -> &[String] {
        &self.config.peers
    }

    pub fn quorum(&self) -> usize {
        self.config.quorum
    }

    // Every processed RPC event moves the term forward by exactly one.
    // Saturates at u64::MAX instead of wrapping back to 0.
    fn advance_term(&mut self) -> u64 {
        self.state.current_term = self.state.current_term.saturating_add(1);
        self.state.current_term
    }

    pub fn handle_message(
        &mut self,
        message: RaftMessage,
    ) -> Result<Option<RaftMessage>, RaftError> {
        match message {
            RaftMessage::SendMessage {
                node_id,
                node_status,
                term,
            } => Ok(Some(self.handle_send_message(node_id, &node_status, term))),
            RaftMessage::RequestVote {
                node_id,
                node_status,
                term,
            } => Ok(Some(self.handle_request_vote(node_id, &node_status, term))),
            // Replies are applied by the outbound drivers, never delivered here.
            RaftMessage::MessageReply { .. } | RaftMessage::VoteReply { .. } => {
                warn!("Ignoring reply delivered as inbound message: {message:?}");
                Ok(None)
            }
        }
    }

    fn handle_send_message(&mut self, node_id: u64, node_status: &str, term: u64) -> RaftMessage {
        let local_term = self.advance_term();

        info!(
            "Received message from node {node_id} (status {node_status}, term {term}); my term is now {local_term}"
        );

        self.audit.record(&AuditEvent {
            direction: Direction::Received,
            kind: EventKind::Message,
            peer: node_id.to_string(),
            status: node_status.to_string(),
            term,
            local_term,
            decision: Decision::Received,
        });

        RaftMessage::MessageReply {
            term: term.saturating_add(1),
        }
    }

    fn handle_request_vote(&mut self, node_id: u64, node_status: &str, term: u64) -> RaftMessage {
        let local_term = self.advance_term();

        let vote_granted = self.state.can_vote() && local_term <= term;
        if vote_granted {
            self.state.last_voted_term = Some(local_term);
        }

        info!(
            "Received vote request from node {node_id} (status {node_status}, term {term}); my term is now {local_term}, vote {}",
            if vote_granted { "granted" } else { "rejected" }
        );

        self.audit.record(&AuditEvent {
            direction: Direction::Received,
            kind: EventKind::VoteRequest,
            peer: node_id.to_string(),
            status: node_status.to_string(),
            term,
            local_term,
            decision: if vote_granted {
                Decision::Granted
            } else {
                Decision::Rejected
            },
        });

        RaftMessage::VoteReply {
            vote_granted,
            term: local_term,
        }
    }

    /// Operator-triggered Follower -> Candidate transition.
    pub fn become_candidate(&mut self) -> Result<(), RaftError> {
        match self.state.role {
            NodeRole::Leader => Err(RaftError::AlreadyLeader),
            NodeRole::Candidate => Ok(()),
            NodeRole::Follower => {
                info!("Node {} becoming candidate at term {}", self.id(), self.current_term());
                self.state.role = NodeRole::Candidate;
                Ok(())
            }
        }
    }

    /// Resets the round's voters and returns the request to send to the
    /// first peer.
    pub fn begin_election_round(&mut self) -> Result<RaftMessage, RaftError> {
        if self.state.role != NodeRole::Candidate {
            return Err(RaftError::NotCandidate(self.state.role));
        }
        self.state.granted_voters.clear();
        self.state.won_election = false;
        Ok(self.vote_request())
    }

    pub fn vote_request(&self) -> RaftMessage {
        RaftMessage::RequestVote {
            node_id: self.state.node_id,
            node_status: self.state.role.to_string(),
            term: self.state.current_term,
        }
    }

    pub fn outbound_message(&self) -> RaftMessage {
        RaftMessage::SendMessage {
            node_id: self.state.node_id,
            node_status: self.state.role.to_string(),
            term: self.state.current_term,
        }
    }

    pub fn apply_vote_reply(
        &mut self,
        peer: &str,
        sent_term: u64,
        vote_granted: bool,
        reply_term: u64,
    ) -> VoteReplyKind {
        let local_term = self.advance_term();

        let kind = if local_term < reply_term {
            info!(
                "Peer {peer} is at term {reply_term}, ahead of my term {local_term}; stepping down"
            );
            self.state.role = NodeRole::Follower;
            VoteReplyKind::Stale
        } else if vote_granted {
            info!("Vote granted by {peer}");
            self.state.granted_voters.insert(peer.to_string());
            VoteReplyKind::Granted
        } else {
            info!("Vote rejected by {peer}");
            VoteReplyKind::Rejected
        };

        self.record_sent(EventKind::VoteRequest, peer, sent_term, match kind {
            VoteReplyKind::Granted => Decision::Granted,
            VoteReplyKind::Rejected => Decision::Rejected,
            VoteReplyKind::Stale => Decision::Stale,
        });

        kind
    }

    /// An unreachable peer counts as a rejection and leaves the term alone.
    pub fn apply_vote_failure(&mut self, peer: &str, sent_term: u64) -> VoteReplyKind {
        info!("Vote request to {peer} failed; counting it as rejected");
        self.record_sent(EventKind::VoteRequest, peer, sent_term, Decision::Failed);
        VoteReplyKind::Rejected
    }

    pub fn finish_election_round(&mut self) -> ElectionOutcome {
        let mut voters: Vec<String> = self.state.granted_voters.iter().cloned().collect();
        voters.sort();
        let term = self.state.current_term;

        if voters.len() >= self.config.quorum {
            info!(
                "Node {} received {} of {} required votes, becoming leader at term {term}",
                self.id(),
                voters.len(),
                self.config.quorum
            );
            self.state.role = NodeRole::Leader;
            self.state.won_election = true;
            ElectionOutcome::Elected { term, voters }
        } else {
            info!(
                "Node {} received {} of {} required votes, staying {}",
                self.id(),
                voters.len(),
                self.config.quorum,
                self.state.role
            );
            ElectionOutcome::NotElected { term, voters }
        }
    }

    pub fn apply_message_reply(&mut self, peer: &str, sent_term: u64, reply_term: u64) {
        self.advance_term();
        debug!("Message to {peer} acknowledged with term {reply_term}");
        self.record_sent(EventKind::Message, peer, sent_term, Decision::Delivered);
    }

    pub fn apply_message_failure(&mut self, peer: &str, sent_term: u64) {
        self.record_sent(EventKind::Message, peer, sent_term, Decision::Failed);
    }

    fn record_sent(&self, kind: EventKind, peer: &str, sent_term: u64, decision: Decision) {
        self.audit.record(&AuditEvent {
            direction: Direction::Sent,
            kind,
            peer: peer.to_string(),
            status: self.state.role.to_string(),
            term: sent_term,
            local_term: self.state.current_term,
            decision,
        });
    }

    pub fn check_invariants(&self) -> Result<(), RaftError> {
        if let Some(voted) = self.state.last_voted_term {
            if voted > self.state.current_term {
                return Err(RaftError::InvariantViolation(format!(
                    "voted in term {voted} but current term is {}",
                    self.state.current_term
                )));
            }
        }

        if let Some(stranger) = self
            .state
            .granted_voters
            .iter()
            .find(|voter| !self.config.peers.contains(*voter))
        {
            return Err(RaftError::InvariantViolation(format!(
                "vote recorded from unknown peer {stranger}"
            )));
        }

        // A node launched as Leader holds no votes; only a won round is checked.
        if self.is_leader()
            && self.state.won_election
            && self.state.granted_voters.len() < self.config.quorum
        {
            return Err(RaftError::InvariantViolation(format!(
                "leader holds {} votes but quorum is {}",
                self.state.granted_voters.len(),
                self.config.quorum
            )));
        }

        Ok(())
    }
}
