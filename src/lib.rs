//! Authenticated HTTP client interceptor pipeline.
//!
//! Wraps a `Transport` with credential handling, request adaptation, retries and
//! observers. Concurrent calls that find the credential expired share a single
//! refresh.

pub mod auth;
pub mod chain;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilience;

pub use auth::{AuthError, Authenticator, BearerAuthenticator};
pub use chain::{CancelToken, InterceptorChain};
pub use config::schema::InterceptorConfig;
pub use credential::{Credential, CredentialStore};
pub use error::{ChainError, ChainResult};
pub use http::{RawResponse, RequestDescriptor, Transport, TransportError};
pub use resilience::{RetryDecision, RetryPolicy};
