use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Received,
    Sent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    VoteRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Received,
    Delivered,
    Failed,
    Granted,
    Rejected,
    Stale,
}

/// One RPC event as seen by this node.
///
/// `peer` is the remote node id for inbound events and the peer address for
/// outbound ones. `status` and `term` are what the message carried;
/// `local_term` is this node's term once the event has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub direction: Direction,
    pub kind: EventKind,
    pub peer: String,
    pub status: String,
    pub term: u64,
    pub local_term: u64,
    pub decision: Decision,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            EventKind::Message => "message",
            EventKind::VoteRequest => "vote request",
        };
        match self.direction {
            Direction::Received => writeln!(f, "RECEIVED {what} from: {}", self.peer)?,
            Direction::Sent => writeln!(f, "SENT {what} to: {}", self.peer)?,
        }
        writeln!(
            f,
            "Status: {}, Term No: {}, My Term No: {}, Outcome: {:?}",
            self.status, self.term, self.local_term, self.decision
        )
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Appends human-readable records to `LOGFILE_<port>.txt`.
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new<P: AsRef<Path>>(dir: P, port: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("LOGFILE_{port}.txt")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(file, "{event}")?;
        Ok(())
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.append(event) {
            warn!("Failed to write audit record to {}: {e}", self.path.display());
        }
    }
}

#[derive(Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Discards every record.
pub struct NullAuditLog;

impl AuditSink for NullAuditLog {
    fn record(&self, _event: &AuditEvent) {}
}
