//! Generic request adapters.
//!
//! Adapters run after the authenticator, in registration order. They set headers,
//! so on conflict the later write wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::credential::CredentialStore;
use crate::error::{ChainError, ChainResult};
use crate::http::request::PreparedRequest;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Mutates an outgoing request before it is sent.
pub trait RequestAdapter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn adapt(&self, request: PreparedRequest) -> ChainResult<PreparedRequest>;
}

/// Sets a fixed header set on every request.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersAdapter {
    headers: HeaderMap,
}

impl DefaultHeadersAdapter {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// `Content-Type` and `Accept` set to JSON.
    pub fn json() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self { headers }
    }

    /// JSON defaults plus the configured extra headers.
    pub fn from_config(extra: &BTreeMap<String, String>) -> ChainResult<Self> {
        let mut adapter = Self::json();
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ChainError::InvalidRequest(format!("header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ChainError::InvalidRequest(format!("header value for {}: {}", name, e)))?;
            adapter.headers.insert(name, value);
        }
        Ok(adapter)
    }
}

impl RequestAdapter for DefaultHeadersAdapter {
    fn name(&self) -> &str {
        "default-headers"
    }

    fn adapt(&self, request: PreparedRequest) -> ChainResult<PreparedRequest> {
        Ok(self
            .headers
            .iter()
            .fold(request, |request, (name, value)| {
                request.with_header(name.clone(), value.clone())
            }))
    }
}

/// Stamps an `x-request-id` on requests that do not carry one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdAdapter;

impl RequestAdapter for RequestIdAdapter {
    fn name(&self) -> &str {
        "request-id"
    }

    fn adapt(&self, request: PreparedRequest) -> ChainResult<PreparedRequest> {
        let name = HeaderName::from_static(REQUEST_ID_HEADER);
        if request.headers().contains_key(&name) {
            return Ok(request);
        }
        let id = uuid::Uuid::new_v4().to_string();
        let value = HeaderValue::from_str(&id)
            .map_err(|e| ChainError::InvalidRequest(format!("request id: {}", e)))?;
        Ok(request.with_header(name, value))
    }
}

/// Injects the stored access token as a bearer header, only for URLs under a prefix.
///
/// This adapter neither validates nor refreshes the credential; use it for chains
/// without an authenticator.
pub struct ScopedTokenAdapter {
    prefix: String,
    store: Arc<dyn CredentialStore>,
}

impl ScopedTokenAdapter {
    pub fn new(prefix: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }
}

impl RequestAdapter for ScopedTokenAdapter {
    fn name(&self) -> &str {
        "scoped-token"
    }

    fn adapt(&self, request: PreparedRequest) -> ChainResult<PreparedRequest> {
        if !request.url().as_str().starts_with(&self.prefix) {
            return Ok(request);
        }
        let Some(credential) = self.store.get() else {
            return Ok(request);
        };
        let value = HeaderValue::from_str(&format!("Bearer {}", credential.access_token()))
            .map_err(|_| ChainError::InvalidRequest("access token is not a valid header".into()))?;
        Ok(request.with_header(AUTHORIZATION, value))
    }
}
