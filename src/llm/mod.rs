//! Model invocation.
//!
//! An [`Endpoint`] performs a single call; [`invoke`] wraps it with the
//! throttling retry protocol and decodes the response text.

pub mod bedrock;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use bedrock::BedrockEndpoint;
pub use retry::{invoke, probe, InvokeError, RetryPolicy};

/// Failure reported by an endpoint for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Rate limited; worth retrying after a pause.
    #[error("throttled: {0}")]
    Throttled(String),

    /// The endpoint answered with a non-retryable error.
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl EndpointError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, EndpointError::Throttled(_))
    }
}

/// A remote inference endpoint.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Send a serialized request body for `model_id`, returning the raw response body.
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError>;
}
