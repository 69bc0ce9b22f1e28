//! Transport abstraction and the reqwest-backed implementation.
//!
//! # Responsibilities
//! - Send a prepared request and buffer the response
//! - Classify failures (connect, timeout, other) for retry decisions
//!
//! # Design Decisions
//! - No timeout is imposed here beyond what the underlying client is built with
//! - HTTP error statuses are responses, not transport errors

use async_trait::async_trait;
use thiserror::Error;

use crate::http::request::PreparedRequest;
use crate::http::response::RawResponse;

/// Failure to get any response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection and timeout errors never reached the application.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Executes prepared requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Transport over a shared `reqwest::Client` connection pool.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
