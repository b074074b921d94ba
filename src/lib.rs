pub mod audit;
pub mod config;
pub mod control;
pub mod network;
pub mod raft;

// Public exports
pub use audit::{AuditEvent, AuditSink, FileAuditLog, MemoryAuditLog};
pub use config::NodeConfig;
pub use raft::{ElectionCoordinator, MessageBroadcaster, NodeRole, RaftNode};
