//! Token refresh collaborators.
//!
//! # Responsibilities
//! - Call the remote refresh endpoint with the current refresh token
//! - Map the reply into a new `Credential` or a typed `AuthError`
//!
//! # Design Decisions
//! - A single attempt per call; retrying is the chain's decision
//! - A reply without a refresh token keeps the previous one

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::error::AuthError;
use crate::credential::Credential;

/// Exchanges a credential for a fresh one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the new access token in seconds.
    pub expires_in: u64,
}

impl RefreshResponse {
    /// Build the credential that replaces `previous`.
    pub fn into_credential(self, previous: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = self
            .refresh_token
            .unwrap_or_else(|| previous.refresh_token().to_string());
        let expires_in = self.expires_in;
        Credential::checked_expiring_in(
            self.access_token,
            refresh_token,
            Duration::from_secs(expires_in),
        )
        .ok_or_else(|| AuthError::Malformed(format!("expires_in out of range: {}", expires_in)))
    }
}

/// Refreshes by POSTing `{"refresh_token": ...}` as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: Url,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest {
                refresh_token: credential.refresh_token(),
            })
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
                message: text,
            });
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "refresh endpoint returned {}: {}",
                status, text
            )));
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Malformed(e.to_string()))?;
        parsed.into_credential(credential)
    }
}

/// Refresher used when no refresh endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn refresh(&self, _credential: &Credential) -> Result<Credential, AuthError> {
        Err(AuthError::RefreshRejected {
            status: 0,
            message: "no refresh endpoint configured".to_string(),
        })
    }
}
