//! Retry policies.
//!
//! # Responsibilities
//! - Decide, per failure, whether to retry now, later, or not at all
//! - Determine if request is retryable (idempotent methods only)
//! - Enforce retry budget (retries as a share of requests)
//!
//! # Design Decisions
//! - Policies only decide; the chain sleeps, counts and enforces the global bound
//! - Never retry POST/PATCH (non-idempotent)
//! - Jittered backoff prevents thundering herd
//! - Connection errors always retryable; 429 and 502/503/504 configurable

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};

use crate::config::RetryConfig;
use crate::http::{PreparedRequest, TransportError};
use crate::resilience::backoff::calculate_backoff;

/// What a policy wants done with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryNow,
    RetryAfter(Duration),
    DoNotRetry,
}

/// Why an attempt failed.
#[derive(Debug, Clone, Copy)]
pub enum RetryCause<'a> {
    Transport(&'a TransportError),
    Status(StatusCode),
}

pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the number of sends made so far for this call (1 on the first failure).
    fn decide(&self, request: &PreparedRequest, cause: RetryCause<'_>, attempt: u32) -> RetryDecision;

    /// Called once per logical call, before the first send.
    fn record_request(&self) {}
}

/// Never retries. The chain's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn decide(&self, _request: &PreparedRequest, _cause: RetryCause<'_>, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

/// Whether a failure of `method` is safe and worth retrying.
///
/// Connectivity errors always qualify. With `retry_on_server_error`, so do 429, 502, 503
/// and 504; a plain 500 does not.
pub fn is_retryable(method: &Method, cause: RetryCause<'_>, retry_on_server_error: bool) -> bool {
    if !method.is_idempotent() {
        return false;
    }
    match cause {
        RetryCause::Transport(e) => e.is_connectivity(),
        RetryCause::Status(status) => {
            retry_on_server_error
                && (status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::BAD_GATEWAY
                    || status == StatusCode::SERVICE_UNAVAILABLE
                    || status == StatusCode::GATEWAY_TIMEOUT)
        }
    }
}

/// Caps retries to a ratio of requests, with a small floor so low traffic can still retry.
#[derive(Debug)]
pub struct RetryBudget {
    ratio: f32,
    min_retries: u64,
    requests: AtomicU64,
    retries: AtomicU64,
}

impl RetryBudget {
    pub fn new(ratio: f32, min_retries: u64) -> Self {
        Self {
            ratio,
            min_retries,
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Reserve one retry if the budget allows it.
    pub fn can_retry(&self) -> bool {
        let requests = self.requests.load(Ordering::Relaxed);
        let allowed = ((requests as f64) * f64::from(self.ratio)) as u64 + self.min_retries;
        self.retries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < allowed).then_some(used + 1)
            })
            .is_ok()
    }
}

/// Retries idempotent requests with exponential backoff, within a retry budget.
#[derive(Debug)]
pub struct BackoffRetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    retry_on_server_error: bool,
    budget: Arc<RetryBudget>,
}

impl BackoffRetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_on_server_error: config.retry_on_server_error,
            budget: Arc::new(RetryBudget::new(config.budget_ratio, 10)),
        }
    }

    pub fn with_budget(mut self, budget: Arc<RetryBudget>) -> Self {
        self.budget = budget;
        self
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn decide(&self, request: &PreparedRequest, cause: RetryCause<'_>, attempt: u32) -> RetryDecision {
        if !is_retryable(request.method(), cause, self.retry_on_server_error) {
            return RetryDecision::DoNotRetry;
        }
        if !self.budget.can_retry() {
            tracing::warn!(url = %request.url(), "Retry budget exhausted");
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::RetryAfter(calculate_backoff(attempt, self.base_delay, self.max_delay))
    }

    fn record_request(&self) {
        self.budget.record_request();
    }
}
