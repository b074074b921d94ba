use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::RaftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Follower => "Follower",
            NodeRole::Candidate => "Candidate",
            NodeRole::Leader => "Leader",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "follower" => Ok(NodeRole::Follower),
            "candidate" => Ok(NodeRole::Candidate),
            "leader" => Ok(NodeRole::Leader),
            _ => Err(RaftError::InvalidRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: u64,
    pub role: NodeRole,
    pub current_term: u64,
    /// Term in which this node last granted a vote, `None` if it never has.
    pub last_voted_term: Option<u64>,
    /// Peers that granted a vote in the election round in progress (or the
    /// last one run). Cleared at the start of every round.
    pub granted_voters: HashSet<String>,
    /// Set when leadership came from a round rather than the launch role.
    pub won_election: bool,
}

impl NodeState {
    pub fn new(node_id: u64, role: NodeRole, current_term: u64) -> Self {
        Self {
            node_id,
            role,
            current_term,
            last_voted_term: None,
            granted_voters: HashSet::new(),
            won_election: false,
        }
    }

    pub fn voted_this_term(&self) -> bool {
        self.last_voted_term == Some(self.current_term)
    }

    pub fn can_vote(&self) -> bool {
        match self.last_voted_term {
            Some(term) => term < self.current_term,
            None => true,
        }
    }
}
