//! Bearer-token authenticator.
//!
//! # Responsibilities
//! - Attach `Authorization: Bearer <access>` plus an optional refresh-token header
//! - Treat 401 as an authentication failure
//! - Recognise whether a request was stamped with a given credential
//! - Delegate refresh to a `TokenRefresher`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

use crate::auth::authenticator::Authenticator;
use crate::auth::error::AuthError;
use crate::auth::refresher::TokenRefresher;
use crate::config::AuthConfig;
use crate::credential::Credential;
use crate::http::{PreparedRequest, RawResponse};

pub struct BearerAuthenticator {
    skew: Duration,
    refresh_token_header: Option<HeaderName>,
    refresher: Arc<dyn TokenRefresher>,
}

impl BearerAuthenticator {
    pub fn new(skew: Duration, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            skew,
            refresh_token_header: None,
            refresher,
        }
    }

    /// Also send the refresh token in `header` on every request.
    pub fn with_refresh_token_header(mut self, header: HeaderName) -> Self {
        self.refresh_token_header = Some(header);
        self
    }

    pub fn from_config(
        config: &AuthConfig,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self, AuthError> {
        let mut authenticator = Self::new(config.skew(), refresher);
        if let Some(header) = &config.refresh_token_header {
            let name = HeaderName::from_bytes(header.as_bytes())
                .map_err(|e| AuthError::InvalidToken(format!("header name {}: {}", header, e)))?;
            authenticator = authenticator.with_refresh_token_header(name);
        }
        Ok(authenticator)
    }

    pub fn skew(&self) -> Duration {
        self.skew
    }
}

fn bearer_value(credential: &Credential) -> String {
    format!("Bearer {}", credential.access_token())
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    fn is_valid(&self, credential: Option<&Credential>) -> bool {
        credential.is_some_and(|c| !c.requires_refresh(self.skew))
    }

    fn adapt(
        &self,
        request: PreparedRequest,
        credential: &Credential,
    ) -> Result<PreparedRequest, AuthError> {
        let authorization = HeaderValue::from_str(&bearer_value(credential))
            .map_err(|_| AuthError::InvalidToken("access token".into()))?;
        let mut request = request.with_header(AUTHORIZATION, authorization);

        if let Some(header) = &self.refresh_token_header {
            let refresh = HeaderValue::from_str(credential.refresh_token())
                .map_err(|_| AuthError::InvalidToken("refresh token".into()))?;
            request = request.with_header(header.clone(), refresh);
        }
        Ok(request)
    }

    fn is_auth_failure(&self, _request: &PreparedRequest, response: &RawResponse) -> bool {
        response.status == StatusCode::UNAUTHORIZED
    }

    fn matches_credential(&self, request: &PreparedRequest, credential: &Credential) -> bool {
        request.header_str(&AUTHORIZATION) == Some(bearer_value(credential).as_str())
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        self.refresher.refresh(credential).await
    }
}
