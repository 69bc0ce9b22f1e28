//! Auth error types.

/// Errors that can occur while obtaining or refreshing a credential.
///
/// `Clone` because one refresh outcome is delivered to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// There is no credential to attach or refresh.
    #[error("no credential available")]
    MissingCredential,

    /// The refresh endpoint rejected the refresh token.
    #[error("refresh rejected ({status}): {message}")]
    RefreshRejected {
        /// HTTP status code returned by the refresh endpoint.
        status: u16,
        /// Error description.
        message: String,
    },

    /// The refresh endpoint could not be reached.
    #[error("network failure during refresh: {0}")]
    Network(String),

    /// The refresh endpoint answered with something that is not a token.
    #[error("malformed refresh response: {0}")]
    Malformed(String),

    /// A token cannot be carried in an HTTP header.
    #[error("token is not a valid header value: {0}")]
    InvalidToken(String),

    /// The refresh task ended without producing an outcome.
    #[error("refresh aborted before completion")]
    Aborted,
}
