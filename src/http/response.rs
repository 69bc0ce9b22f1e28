//! Raw responses as returned by a transport.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{ChainError, ChainResult};

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 4xx and 5xx.
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> ChainResult<T> {
        let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(body).map_err(|e| ChainError::Decode(e.to_string()))
    }

    /// Turn an error response into the matching chain error.
    pub fn into_status_error(self) -> ChainError {
        ChainError::Status {
            status: self.status,
            body: self.text_lossy(),
        }
    }
}
