use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use crate::network::proto::raft_service_server::{RaftService, RaftServiceServer};
use crate::raft::{RaftMessage, RaftNode};

use super::proto::*;

pub struct RaftServer {
    node: Arc<Mutex<RaftNode>>,
}

impl RaftServer {
    pub fn new(node: Arc<Mutex<RaftNode>>) -> Self {
        Self { node }
    }

    async fn dispatch(&self, message: RaftMessage) -> Result<RaftMessage, Status> {
        let mut node = self.node.lock().await;

        match node.handle_message(message) {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(Status::internal("No reply produced")),
            Err(e) => {
                error!("Error handling inbound RPC: {e}");
                Err(Status::internal(format!("Internal error: {e}")))
            }
        }
    }
}

/// Binds the node's listening socket. Done before any peer is contacted so a
/// taken port fails the launch.
pub async fn bind(address: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(address).await
}

/// Serves the RPC surface on an already bound listener until it fails.
pub async fn serve(
    listener: TcpListener,
    node: Arc<Mutex<RaftNode>>,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("Node running on {addr}");
    }
    Server::builder()
        .add_service(RaftServiceServer::new(RaftServer::new(node)))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
}

#[tonic::async_trait]
impl RaftService for RaftServer {
    async fn send_message(
        &self,
        request: Request<MessageContent>,
    ) -> Result<Response<MessageReply>, Status> {
        let req = request.into_inner();
        debug!("Received SendMessage: {:?}", req);

        let message = RaftMessage::SendMessage {
            node_id: req.node_id,
            node_status: req.node_status,
            term: req.term_no,
        };

        match self.dispatch(message).await? {
            RaftMessage::MessageReply { term } => Ok(Response::new(MessageReply { term_no: term })),
            other => Err(Status::internal(format!("Unexpected reply: {other:?}"))),
        }
    }

    async fn request_vote(
        &self,
        request: Request<VoteRequest>,
    ) -> Result<Response<VoteReply>, Status> {
        let req = request.into_inner();
        debug!("Received RequestVote: {:?}", req);

        let message = RaftMessage::RequestVote {
            node_id: req.node_id,
            node_status: req.node_status,
            term: req.term_no,
        };

        match self.dispatch(message).await? {
            RaftMessage::VoteReply { vote_granted, term } => Ok(Response::new(VoteReply {
                vote_granted,
                term_no: term,
            })),
            other => Err(Status::internal(format!("Unexpected reply: {other:?}"))),
        }
    }
}
