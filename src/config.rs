use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raft::{CallPolicy, NodeRole, RaftConfig, RaftError};

/// Bootstrap cluster used when no peer list is configured.
pub const DEFAULT_CLUSTER: [&str; 4] = [
    "0.0.0.0:4001",
    "0.0.0.0:4002",
    "0.0.0.0:4003",
    "0.0.0.0:4004",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error(transparent)]
    InvalidRole(#[from] RaftError),

    #[error("Initial term {0} leaves no room to advance")]
    InvalidTerm(u64),

    #[error("No peers left after removing this node from the cluster list")]
    NoPeers,

    #[error("Quorum {quorum} is unreachable with {peers} peers")]
    InvalidQuorum { quorum: usize, peers: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Listening port, also this node's id.
    pub port: String,
    pub initial_role: String,
    pub initial_term: u64,
    /// Every cluster member, this node included.
    pub cluster: Vec<String>,
    /// Votes needed to win; majority of the cluster when unset.
    pub quorum: Option<usize>,
    pub audit_dir: PathBuf,
    pub policy: CallPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: "4001".to_string(),
            initial_role: NodeRole::Follower.to_string(),
            initial_term: 1,
            cluster: DEFAULT_CLUSTER.iter().map(|a| a.to_string()).collect(),
            quorum: None,
            audit_dir: PathBuf::from("."),
            policy: CallPolicy::default(),
        }
    }
}

/// Port part of an `host:port` address, if any.
pub fn port_of(address: &str) -> Option<&str> {
    address.rsplit_once(':').map(|(_, port)| port)
}

/// Drops every address whose port matches `own_port`, preserving order.
pub fn exclude_self(cluster: &[String], own_port: &str) -> Vec<String> {
    cluster
        .iter()
        .filter(|address| port_of(address) != Some(own_port))
        .cloned()
        .collect()
}

impl NodeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn node_id(&self) -> Result<u64, ConfigError> {
        match self.port.parse::<u16>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidPort(self.port.clone())),
            Ok(port) => Ok(u64::from(port)),
        }
    }

    pub fn role(&self) -> Result<NodeRole, ConfigError> {
        Ok(self.initial_role.parse::<NodeRole>()?)
    }

    pub fn peers(&self) -> Vec<String> {
        exclude_self(&self.cluster, &self.port)
    }

    pub fn quorum(&self) -> usize {
        self.quorum
            .unwrap_or_else(|| RaftConfig::majority(self.peers().len()))
    }

    pub fn listen_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node_id()?;
        self.role()?;

        if self.initial_term == u64::MAX {
            return Err(ConfigError::InvalidTerm(self.initial_term));
        }

        let peers = self.peers().len();
        if peers == 0 {
            return Err(ConfigError::NoPeers);
        }

        let quorum = self.quorum();
        if quorum == 0 || quorum > peers {
            return Err(ConfigError::InvalidQuorum { quorum, peers });
        }

        Ok(())
    }

    pub fn raft_config(&self) -> Result<RaftConfig, ConfigError> {
        self.validate()?;
        Ok(RaftConfig::new(self.node_id()?, self.peers())
            .with_quorum(self.quorum())
            .with_policy(self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(port: &str) -> NodeConfig {
        NodeConfig {
            port: port.to_string(),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn self_is_excluded_from_bootstrap_list() {
        let cfg = config_for("4002");
        assert_eq!(
            cfg.peers(),
            vec!["0.0.0.0:4001", "0.0.0.0:4003", "0.0.0.0:4004"]
        );
    }

    #[test]
    fn exclusion_matches_whole_port_only() {
        let cluster = vec!["10.0.0.1:14002".to_string(), "10.0.0.2:4002".to_string()];
        assert_eq!(exclude_self(&cluster, "4002"), vec!["10.0.0.1:14002"]);
        assert_eq!(port_of("no-port"), None);
    }

    #[test]
    fn default_quorum_is_cluster_majority() {
        let cfg = config_for("4001");
        assert_eq!(cfg.quorum(), 3);

        let explicit = NodeConfig {
            quorum: Some(2),
            ..config_for("4001")
        };
        assert_eq!(explicit.quorum(), 2);
    }

    #[test]
    fn raft_config_carries_id_peers_and_policy() {
        let cfg = NodeConfig {
            policy: CallPolicy::immediate(),
            ..config_for("4003")
        };
        let raft = cfg.raft_config().expect("valid config");
        assert_eq!(raft.node_id, 4003);
        assert_eq!(raft.peers.len(), 3);
        assert_eq!(raft.quorum, 3);
        assert_eq!(raft.policy, CallPolicy::immediate());
    }

    #[test]
    fn validation_rejects_bad_launch_parameters() {
        assert!(matches!(
            config_for("abc").validate(),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            config_for("0").validate(),
            Err(ConfigError::InvalidPort(_))
        ));

        let bad_role = NodeConfig {
            initial_role: "Observer".to_string(),
            ..config_for("4001")
        };
        assert!(matches!(
            bad_role.validate(),
            Err(ConfigError::InvalidRole(_))
        ));

        let exhausted = NodeConfig {
            initial_term: u64::MAX,
            ..config_for("4001")
        };
        assert!(matches!(
            exhausted.validate(),
            Err(ConfigError::InvalidTerm(u64::MAX))
        ));

        let lonely = NodeConfig {
            cluster: vec!["0.0.0.0:4001".to_string()],
            ..config_for("4001")
        };
        assert!(matches!(lonely.validate(), Err(ConfigError::NoPeers)));

        let greedy = NodeConfig {
            quorum: Some(4),
            ..config_for("4001")
        };
        assert!(matches!(
            greedy.validate(),
            Err(ConfigError::InvalidQuorum { quorum: 4, peers: 3 })
        ));
    }

    #[test]
    fn partial_config_file_falls_back_to_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("node.json");
        std::fs::write(
            &path,
            r#"{ "port": "5002", "initial_role": "Candidate",
                 "cluster": ["127.0.0.1:5001", "127.0.0.1:5002", "127.0.0.1:5003"],
                 "policy": { "pacing_ms": 0 } }"#,
        )
        .expect("write config");

        let cfg = NodeConfig::from_file(&path).expect("load config");
        assert_eq!(cfg.port, "5002");
        assert_eq!(cfg.role().unwrap(), NodeRole::Candidate);
        assert_eq!(cfg.initial_term, 1);
        assert_eq!(cfg.peers(), vec!["127.0.0.1:5001", "127.0.0.1:5003"]);
        assert_eq!(cfg.quorum(), 2);
        assert_eq!(cfg.policy.pacing_ms, 0);
        assert_eq!(cfg.policy.timeout_ms, 5000);
    }

    #[test]
    fn unreadable_config_file_is_reported() {
        assert!(matches!(
            NodeConfig::from_file("/nonexistent/votenode.json"),
            Err(ConfigError::IoError(_))
        ));
    }
}
