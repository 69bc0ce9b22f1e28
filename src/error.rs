//! Caller-facing error taxonomy.

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::http::TransportError;

/// Terminal error of a logical call through the chain.
///
/// `Clone` so a single outcome can be handed to observers and the caller alike.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The request could not be built (bad URL, unencodable parameters, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connectivity or timeout failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Upstream answered with an error status that was not retried.
    #[error("upstream returned status {status}")]
    Status { status: StatusCode, body: String },

    /// The credential could not be obtained or refreshed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Upstream kept rejecting the credential after refreshing it.
    #[error("request rejected with status {status} after {auth_retries} credential refresh(es)")]
    AuthRejected { status: StatusCode, auth_retries: u32 },

    /// The response body did not decode into the requested type.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Retries ran out for a retryable failure.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    PolicyExhausted { attempts: u32, last: Box<ChainError> },

    /// The caller cancelled the call before it reached a terminal state.
    #[error("request cancelled")]
    Cancelled,
}

impl ChainError {
    /// Status code carried by the error, if the failure came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ChainError::Status { status, .. } | ChainError::AuthRejected { status, .. } => {
                Some(*status)
            }
            ChainError::PolicyExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
