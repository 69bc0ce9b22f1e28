//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed attempt (transport error or error status):
//!     → retries.rs RetryPolicy::decide (retry now / after delay / stop)
//!     → backoff.rs (delay for BackoffRetryPolicy)
//!     → chain enforces the per-call retry bound and sleeps
//! ```
//!
//! # Design Decisions
//! - Retries only for idempotent requests (GET, HEAD, PUT, DELETE, ...)
//! - Retry budget prevents retry storms under load
//! - Authentication retries are not a policy concern; the chain owns them

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{
    is_retryable, BackoffRetryPolicy, NeverRetry, RetryBudget, RetryCause, RetryDecision,
    RetryPolicy,
};
