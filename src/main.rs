use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use votenode::audit::FileAuditLog;
use votenode::control::{self, Controller};
use votenode::network::{self, GrpcTransport};
use votenode::raft::{NodeRole, RaftNode};
use votenode::NodeConfig;

fn init_logging() {
    // When VOTENODE_LOG_FILE is set, plain logs go to that file through
    // env_logger; otherwise tracing formats them on stderr.
    if let Ok(path) = std::env::var("VOTENODE_LOG_FILE") {
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {path}: {e}; logging to stderr"),
        }
        let _ = builder.try_init();
        return;
    }

    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[derive(Parser)]
#[command(name = "votenode")]
#[command(about = "A minimal term-tracking election node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a node and join the cluster
    Node {
        /// Port to listen on; also used as the node id
        #[arg(short, long)]
        port: Option<String>,

        /// Initial role: Follower, Candidate or Leader
        #[arg(short, long)]
        role: Option<String>,

        /// Initial term number
        #[arg(short, long)]
        term: Option<u64>,

        /// Comma-separated list of every cluster address (this node included)
        #[arg(long)]
        peers: Option<String>,

        /// JSON config file; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Votes needed to become leader (default: cluster majority)
        #[arg(short, long)]
        quorum: Option<usize>,

        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Retries after a transport failure
        #[arg(long)]
        retries: Option<u32>,

        /// Base backoff between retries in milliseconds
        #[arg(long)]
        backoff_ms: Option<u64>,

        /// Delay between vote requests in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Directory for the LOGFILE_<port>.txt audit trail
        #[arg(long)]
        audit_dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Do not run an election at startup even when launched as Candidate
        #[arg(long)]
        skip_election: bool,
    },
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    port: Option<String>,
    role: Option<String>,
    term: Option<u64>,
    peers: Option<String>,
    config: Option<PathBuf>,
    quorum: Option<usize>,
    timeout_ms: Option<u64>,
    retries: Option<u32>,
    backoff_ms: Option<u64>,
    pacing_ms: Option<u64>,
    audit_dir: Option<PathBuf>,
) -> anyhow::Result<NodeConfig> {
    let mut cfg = match config {
        Some(path) => NodeConfig::from_file(&path)?,
        None => NodeConfig::default(),
    };

    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(role) = role {
        cfg.initial_role = role;
    }
    if let Some(term) = term {
        cfg.initial_term = term;
    }
    if let Some(peers) = peers {
        cfg.cluster = peers
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }
    if quorum.is_some() {
        cfg.quorum = quorum;
    }
    if let Some(timeout_ms) = timeout_ms {
        cfg.policy.timeout_ms = timeout_ms;
    }
    if let Some(retries) = retries {
        cfg.policy.max_retries = retries;
    }
    if let Some(backoff_ms) = backoff_ms {
        cfg.policy.backoff_ms = backoff_ms;
    }
    if let Some(pacing_ms) = pacing_ms {
        cfg.policy.pacing_ms = pacing_ms;
    }
    if let Some(audit_dir) = audit_dir {
        cfg.audit_dir = audit_dir;
    }

    cfg.validate()?;
    Ok(cfg)
}

async fn run_node(cfg: NodeConfig, confirm: bool, skip_election: bool) -> anyhow::Result<()> {
    let role = cfg.role()?;

    println!(
        "Node ID: {} Status: {} Term No: {}",
        cfg.port, role, cfg.initial_term
    );
    if confirm {
        let proceed = tokio::task::spawn_blocking(|| {
            control::confirm("Continue with these parameters? (y/n): ")
        })
        .await?;
        if !proceed {
            println!("Terminating....");
            return Ok(());
        }
    }

    let raft_config = cfg.raft_config()?;
    println!("This node will send messages to the following nodes:");
    for peer in &raft_config.peers {
        println!("ID: {peer}");
    }

    std::fs::create_dir_all(&cfg.audit_dir)?;
    let audit = Arc::new(FileAuditLog::new(&cfg.audit_dir, &cfg.port));
    info!("Writing audit trail to {}", audit.path().display());

    let transport = Arc::new(GrpcTransport::new(&raft_config.policy));
    let node = Arc::new(Mutex::new(RaftNode::new(
        raft_config,
        role,
        cfg.initial_term,
        audit,
    )));

    let listener = network::bind(&cfg.listen_address())
        .await
        .with_context(|| format!("cannot listen on {}", cfg.listen_address()))?;
    let server_node = Arc::clone(&node);
    let server = tokio::spawn(async move {
        if let Err(e) = network::serve(listener, server_node).await {
            error!("gRPC server error: {e}");
        }
    });

    // Give the peers' listeners a moment before the startup election.
    sleep(Duration::from_secs(1)).await;

    let controller = Controller::new(Arc::clone(&node), transport);

    if role == NodeRole::Candidate && !skip_election {
        match controller.election().run_round().await {
            Ok(outcome) => println!("{}", control::describe_outcome(&outcome)),
            Err(e) => error!("Election failed: {e}"),
        }
    }

    println!("Received messages will show here.");
    println!("{}", control::HELP);

    let (tx, rx) = mpsc::channel(16);
    let console = control::spawn_console("> ", tx);
    controller.run(rx).await;
    let _ = console.await;

    println!("==> This node can only receive messages from now! Press Ctrl-C to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
        _ = server => {
            error!("gRPC server stopped");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            port,
            role,
            term,
            peers,
            config,
            quorum,
            timeout_ms,
            retries,
            backoff_ms,
            pacing_ms,
            audit_dir,
            yes,
            skip_election,
        } => {
            let cfg = build_config(
                port, role, term, peers, config, quorum, timeout_ms, retries, backoff_ms,
                pacing_ms, audit_dir,
            )?;
            run_node(cfg, !yes, skip_election).await?;
        }
    }

    Ok(())
}
