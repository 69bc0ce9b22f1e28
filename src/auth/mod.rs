//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! chain Preparing:  Authenticator::is_valid(current credential)
//! chain Adapting:   Authenticator::adapt(request, credential)
//! chain on reply:   Authenticator::is_auth_failure + matches_credential
//! chain refresh:    Authenticator::refresh → TokenRefresher → new Credential
//! ```
//!
//! # Design Decisions
//! - The authenticator never triggers a refresh by itself; the chain decides
//! - Refresh failures are typed so callers can tell them from rejections
//! - Tokens are never logged

pub mod authenticator;
pub mod bearer;
pub mod error;
pub mod refresher;

pub use authenticator::Authenticator;
pub use bearer::BearerAuthenticator;
pub use error::AuthError;
pub use refresher::{HttpTokenRefresher, NoRefresh, RefreshResponse, TokenRefresher};
