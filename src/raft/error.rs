use thiserror::Error;

use super::NodeRole;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Not a candidate (current role: {0})")]
    NotCandidate(NodeRole),

    #[error("Already the leader")]
    AlreadyLeader,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}
