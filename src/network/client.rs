use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::network::proto::raft_service_client::RaftServiceClient;
use crate::network::proto::{MessageContent, VoteRequest};
use crate::raft::{CallPolicy, RaftMessage};

use super::{NetworkError, PeerTransport};

pub struct RaftClient {
    address: String,
    timeout: Duration,
    client: Option<RaftServiceClient<Channel>>,
}

impl RaftClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            timeout: Duration::from_secs(5),
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn connect(&mut self) -> Result<(), NetworkError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.address))
            .map_err(|e| NetworkError::ConnectionError(e.to_string()))?;

        let channel = endpoint
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await?;

        self.client = Some(RaftServiceClient::new(channel));

        Ok(())
    }

    fn stub(&mut self) -> Result<&mut RaftServiceClient<Channel>, NetworkError> {
        self.client
            .as_mut()
            .ok_or_else(|| NetworkError::ConnectionError("Client not connected".to_string()))
    }

    pub async fn send_message(
        &mut self,
        node_id: u64,
        node_status: &str,
        term: u64,
    ) -> Result<RaftMessage, NetworkError> {
        if self.client.is_none() {
            self.connect().await?;
        }

        let request = MessageContent {
            node_id,
            node_status: node_status.to_string(),
            term_no: term,
        };

        let response = self
            .stub()?
            .send_message(Request::new(request))
            .await?
            .into_inner();

        Ok(RaftMessage::MessageReply {
            term: response.term_no,
        })
    }

    pub async fn request_vote(
        &mut self,
        node_id: u64,
        node_status: &str,
        term: u64,
    ) -> Result<RaftMessage, NetworkError> {
        if self.client.is_none() {
            self.connect().await?;
        }

        let request = VoteRequest {
            node_id,
            node_status: node_status.to_string(),
            term_no: term,
        };

        let response = self
            .stub()?
            .request_vote(Request::new(request))
            .await?
            .into_inner();

        Ok(RaftMessage::VoteReply {
            vote_granted: response.vote_granted,
            term: response.term_no,
        })
    }
}

/// Dials a fresh channel to the peer for every call.
pub struct GrpcTransport {
    timeout: Duration,
}

impl GrpcTransport {
    pub fn new(policy: &CallPolicy) -> Self {
        Self {
            timeout: policy.timeout(),
        }
    }
}

#[tonic::async_trait]
impl PeerTransport for GrpcTransport {
    async fn call(&self, peer: &str, message: RaftMessage) -> Result<RaftMessage, NetworkError> {
        let mut client = RaftClient::new(peer).with_timeout(self.timeout);

        match message {
            RaftMessage::SendMessage {
                node_id,
                node_status,
                term,
            } => client.send_message(node_id, &node_status, term).await,
            RaftMessage::RequestVote {
                node_id,
                node_status,
                term,
            } => client.request_vote(node_id, &node_status, term).await,
            other => Err(NetworkError::InvalidMessage(format!("{other:?}"))),
        }
    }
}
