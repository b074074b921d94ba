#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use votenode::audit::MemoryAuditLog;
use votenode::network::{NetworkError, PeerTransport};
use votenode::raft::{CallPolicy, NodeRole, RaftConfig, RaftMessage, RaftNode, SharedNode};

pub fn addrs(ports: &[u16]) -> Vec<String> {
    ports.iter().map(|p| format!("0.0.0.0:{p}")).collect()
}

pub fn shared_node(
    id: u64,
    peers: Vec<String>,
    quorum: usize,
    role: NodeRole,
    term: u64,
) -> (SharedNode, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let config = RaftConfig::new(id, peers)
        .with_quorum(quorum)
        .with_policy(CallPolicy::immediate());
    let node = RaftNode::new(config, role, term, audit.clone());
    (Arc::new(Mutex::new(node)), audit)
}

/// Canned reply for one peer.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Grant,
    Reject,
    /// Reply with a term far ahead of anything the caller holds.
    Ahead,
    Unreachable,
    /// Answer with the reply type of the other RPC.
    Mismatched,
}

/// Answers vote requests from a per-peer script and records who was asked.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    contacted: StdMutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(peer, script)| (peer.to_string(), *script))
                .collect(),
            contacted: StdMutex::new(Vec::new()),
        }
    }

    pub fn contacted(&self) -> Vec<String> {
        self.contacted.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl PeerTransport for ScriptedTransport {
    async fn call(&self, peer: &str, message: RaftMessage) -> Result<RaftMessage, NetworkError> {
        self.contacted.lock().unwrap().push(peer.to_string());

        let script = self.scripts.get(peer).copied().unwrap_or(Script::Reject);
        let term = message.term();

        match (script, message) {
            (Script::Unreachable, _) => Err(NetworkError::ConnectionError(format!(
                "{peer} refused connection"
            ))),
            (Script::Mismatched, RaftMessage::RequestVote { .. }) => {
                Ok(RaftMessage::MessageReply { term: term + 1 })
            }
            (Script::Mismatched, RaftMessage::SendMessage { .. }) => Ok(RaftMessage::VoteReply {
                vote_granted: true,
                term: term + 1,
            }),
            (script, RaftMessage::RequestVote { .. }) => Ok(RaftMessage::VoteReply {
                vote_granted: matches!(script, Script::Grant),
                term: match script {
                    Script::Ahead => term + 100,
                    _ => term + 1,
                },
            }),
            (_, RaftMessage::SendMessage { .. }) => Ok(RaftMessage::MessageReply { term: term + 1 }),
            (_, other) => Err(NetworkError::InvalidMessage(format!("{other:?}"))),
        }
    }
}

/// Delivers calls straight into other in-process nodes.
#[derive(Default)]
pub struct LocalTransport {
    nodes: HashMap<String, SharedNode>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, address: &str, node: SharedNode) -> Self {
        self.nodes.insert(address.to_string(), node);
        self
    }
}

#[tonic::async_trait]
impl PeerTransport for LocalTransport {
    async fn call(&self, peer: &str, message: RaftMessage) -> Result<RaftMessage, NetworkError> {
        let node = self
            .nodes
            .get(peer)
            .ok_or_else(|| NetworkError::ConnectionError(format!("no route to {peer}")))?;

        let mut node = node.lock().await;
        node.handle_message(message)
            .map_err(|e| NetworkError::ConnectionError(e.to_string()))?
            .ok_or_else(|| NetworkError::UnexpectedReply("no reply".to_string()))
    }
}
