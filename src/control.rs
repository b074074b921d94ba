use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::network::PeerTransport;
use crate::raft::{ElectionCoordinator, ElectionOutcome, MessageBroadcaster, SharedNode};

/// Operator commands, delivered to the node over a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Send one message to every peer.
    Send,
    /// Become a candidate (if a follower) and run an election round.
    Elect,
    Status,
    Help,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "send" | "s" | "1" => Ok(ControlCommand::Send),
            "elect" | "vote" | "e" => Ok(ControlCommand::Elect),
            "status" | "st" => Ok(ControlCommand::Status),
            "help" | "h" | "?" => Ok(ControlCommand::Help),
            "quit" | "exit" | "q" => Ok(ControlCommand::Quit),
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

pub const HELP: &str = "Commands:
  send    send a message to all other nodes
  elect   become a candidate and request votes
  status  show this node's state
  quit    stop sending; keep serving inbound RPCs";

/// Executes control commands against the shared node.
pub struct Controller<T: PeerTransport + ?Sized> {
    node: SharedNode,
    election: ElectionCoordinator<T>,
    broadcaster: MessageBroadcaster<T>,
}

impl<T: PeerTransport + ?Sized> Controller<T> {
    pub fn new(node: SharedNode, transport: Arc<T>) -> Self {
        Self {
            election: ElectionCoordinator::new(Arc::clone(&node), Arc::clone(&transport)),
            broadcaster: MessageBroadcaster::new(Arc::clone(&node), transport),
            node,
        }
    }

    pub fn election(&self) -> &ElectionCoordinator<T> {
        &self.election
    }

    pub async fn status(&self) -> String {
        let node = self.node.lock().await;
        let state = node.state();
        let mut out = String::new();
        let _ = writeln!(out, "My ID: {}", state.node_id);
        let _ = writeln!(out, "My Status: {}", state.role);
        let _ = writeln!(out, "My Term No: {}", state.current_term);
        let _ = write!(
            out,
            "Voted this term: {}",
            if state.voted_this_term() { "yes" } else { "no" }
        );
        out
    }

    /// Runs `command` and returns the text to show the operator, or `None`
    /// once the operator asked to stop.
    pub async fn execute(&self, command: ControlCommand) -> Option<String> {
        match command {
            ControlCommand::Send => {
                let report = self.broadcaster.broadcast_once().await;
                Some(format!(
                    "Sent to {} peer(s), {} failed; my term is now {}",
                    report.delivered.len(),
                    report.failed.len(),
                    report.term
                ))
            }
            ControlCommand::Elect => {
                if let Err(e) = self.node.lock().await.become_candidate() {
                    return Some(format!("Cannot start election: {e}"));
                }
                Some(match self.election.run_round().await {
                    Ok(outcome) => describe_outcome(&outcome),
                    Err(e) => format!("Election failed: {e}"),
                })
            }
            ControlCommand::Status => Some(self.status().await),
            ControlCommand::Help => Some(HELP.to_string()),
            ControlCommand::Quit => None,
        }
    }

    /// Consumes commands until `Quit` arrives or the sender goes away.
    pub async fn run(&self, mut commands: mpsc::Receiver<ControlCommand>) {
        while let Some(command) = commands.recv().await {
            match self.execute(command).await {
                Some(text) => println!("{text}"),
                None => break,
            }
        }
        info!("Control channel closed; no longer sending");
    }
}

pub fn describe_outcome(outcome: &ElectionOutcome) -> String {
    match outcome {
        ElectionOutcome::Elected { term, voters } => format!(
            "===> My Status: Leader (term {term}, votes from {})",
            voters.join(", ")
        ),
        ElectionOutcome::NotElected { term, voters } => format!(
            "Election lost at term {term}: only {} vote(s)",
            voters.len()
        ),
        ElectionOutcome::SteppedDown { term, peer } => format!(
            "===> My Status: Follower ({peer} has a newer term; my term is {term})"
        ),
    }
}

/// Reads console lines on a blocking thread and forwards parsed commands.
/// The returned handle finishes on `quit`, EOF or Ctrl-C.
pub fn spawn_console(
    prompt: &'static str,
    commands: mpsc::Sender<ControlCommand>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                error!("Failed to create line editor: {e}");
                let _ = commands.blocking_send(ControlCommand::Quit);
                return;
            }
        };

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());
                    match line.parse::<ControlCommand>() {
                        Ok(command) => {
                            if commands.blocking_send(command).is_err() {
                                return;
                            }
                            if command == ControlCommand::Quit {
                                return;
                            }
                        }
                        Err(e) => println!("{e}\n{HELP}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    let _ = commands.blocking_send(ControlCommand::Quit);
                    return;
                }
                Err(e) => {
                    error!("Console read error: {e}");
                    let _ = commands.blocking_send(ControlCommand::Quit);
                    return;
                }
            }
        }
    })
}

/// Blocking y/n prompt, meant for `spawn_blocking`; anything but an explicit
/// "n" continues.
pub fn confirm(question: &str) -> bool {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(_) => return true,
    };
    match rl.readline(question) {
        Ok(answer) => !answer.trim().eq_ignore_ascii_case("n"),
        Err(_) => false,
    }
}
