//! Per-call state.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::credential::Credential;
use crate::http::PreparedRequest;

/// Where a logical call is in the chain's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Preparing,
    Adapting,
    Sending,
    AuthRetry,
    Retry,
    Success,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Success | CallState::Failed)
    }
}

/// State of one logical call, from first send to terminal outcome.
#[derive(Debug)]
pub struct RequestContext {
    call_id: Uuid,
    state: CallState,
    request: PreparedRequest,
    credential: Option<Arc<Credential>>,
    attempts: u32,
    auth_retries: u32,
    generic_retries: u32,
    max_retries: u32,
    started: Instant,
}

impl RequestContext {
    pub fn new(request: PreparedRequest, max_retries: u32) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            state: CallState::Preparing,
            request,
            credential: None,
            attempts: 0,
            auth_retries: 0,
            generic_retries: 0,
            max_retries,
            started: Instant::now(),
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn transition(&mut self, next: CallState) {
        tracing::trace!(call_id = %self.call_id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    /// Record the adapted request and the credential it was stamped with.
    pub fn stamp(&mut self, request: PreparedRequest, credential: Option<Arc<Credential>>) {
        self.request = request;
        self.credential = credential;
    }

    pub fn request(&self) -> &PreparedRequest {
        &self.request
    }

    pub fn credential(&self) -> Option<&Arc<Credential>> {
        self.credential.as_ref()
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Sends made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn auth_retries(&self) -> u32 {
        self.auth_retries
    }

    pub fn generic_retries(&self) -> u32 {
        self.generic_retries
    }

    /// Auth and generic retries combined.
    pub fn retries(&self) -> u32 {
        self.auth_retries + self.generic_retries
    }

    pub fn can_retry(&self) -> bool {
        self.retries() < self.max_retries
    }

    /// Consume one auth retry. False when the bound is reached.
    pub fn consume_auth_retry(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.auth_retries += 1;
        true
    }

    /// Consume one generic retry. False when the bound is reached.
    pub fn consume_generic_retry(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.generic_retries += 1;
        true
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}
