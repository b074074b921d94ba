use thiserror::Error;
use tonic::{Code, Status};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("gRPC error: {0}")]
    GrpcError(#[from] Status),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout error")]
    TimeoutError,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Invalid outbound message: {0}")]
    InvalidMessage(String),
}

impl NetworkError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::TransportError(_)
            | NetworkError::ConnectionError(_)
            | NetworkError::TimeoutError => true,
            NetworkError::GrpcError(status) => matches!(
                status.code(),
                Code::Unavailable | Code::DeadlineExceeded | Code::Unknown
            ),
            NetworkError::UnexpectedReply(_) | NetworkError::InvalidMessage(_) => false,
        }
    }
}
