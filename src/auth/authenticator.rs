//! The authenticator contract.

use async_trait::async_trait;

use crate::auth::error::AuthError;
use crate::credential::Credential;
use crate::http::{PreparedRequest, RawResponse};

/// Decides credential validity, adapts requests, detects auth failures and refreshes.
///
/// `refresh` is only ever called by the chain's refresh coordinator, one call at a
/// time, and must not retry internally.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// False when the credential is absent or due for refresh.
    fn is_valid(&self, credential: Option<&Credential>) -> bool;

    /// Attach the credential. Must be pure: same inputs, same output.
    fn adapt(
        &self,
        request: PreparedRequest,
        credential: &Credential,
    ) -> Result<PreparedRequest, AuthError>;

    /// Whether the response rejected the request's authentication.
    fn is_auth_failure(&self, request: &PreparedRequest, response: &RawResponse) -> bool;

    /// Whether the request currently carries this credential.
    fn matches_credential(&self, request: &PreparedRequest, credential: &Credential) -> bool;

    /// Exchange the credential for a fresh one.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}
