use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How each outbound peer call is bounded and paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicy {
    pub timeout_ms: u64,
    /// Extra attempts after a transport failure. Zero means one attempt.
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Delay between successive vote requests in an election round.
    pub pacing_ms: u64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_retries: 0,
            backoff_ms: 200,
            pacing_ms: 3000,
        }
    }
}

impl CallPolicy {
    /// No pacing, no retries, short timeout.
    pub fn immediate() -> Self {
        Self {
            timeout_ms: 1000,
            max_retries: 0,
            backoff_ms: 0,
            pacing_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub node_id: u64,
    pub peers: Vec<String>, // addresses, self excluded
    pub quorum: usize,
    pub policy: CallPolicy,
}

impl RaftConfig {
    pub fn new(node_id: u64, peers: Vec<String>) -> Self {
        let quorum = Self::majority(peers.len());
        Self {
            node_id,
            peers,
            quorum,
            policy: CallPolicy::default(),
        }
    }

    /// Majority of a cluster made of `peer_count` peers plus this node.
    pub fn majority(peer_count: usize) -> usize {
        (peer_count + 1) / 2 + 1
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }
}
