mod broadcast;
mod config;
mod election;
mod error;
mod node;
mod state;

pub use self::broadcast::{BroadcastReport, MessageBroadcaster};
pub use self::config::{CallPolicy, RaftConfig};
pub use self::election::{ElectionCoordinator, ElectionOutcome};
pub use self::error::RaftError;
pub use self::node::{RaftNode, VoteReplyKind};
pub use self::state::{NodeRole, NodeState};

use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedNode = Arc<Mutex<RaftNode>>;

// Messages exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaftMessage {
    SendMessage {
        node_id: u64,
        node_status: String,
        term: u64,
    },
    MessageReply {
        term: u64,
    },
    RequestVote {
        node_id: u64,
        node_status: String,
        term: u64,
    },
    VoteReply {
        vote_granted: bool,
        term: u64,
    },
}

impl RaftMessage {
    pub fn term(&self) -> u64 {
        match self {
            RaftMessage::SendMessage { term, .. }
            | RaftMessage::MessageReply { term }
            | RaftMessage::RequestVote { term, .. }
            | RaftMessage::VoteReply { term, .. } => *term,
        }
    }
}
