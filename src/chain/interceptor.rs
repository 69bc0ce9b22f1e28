//! The interceptor chain.
//!
//! # Responsibilities
//! - Run one logical call through prepare, adapt, send and the retry loop
//! - Trigger coordinated refreshes before sending and after auth failures
//! - Enforce the per-call retry bound across auth and generic retries
//! - Notify observers and record metrics
//!
//! # State Machine
//! ```text
//! Preparing ──credential valid or refreshed──→ Adapting ──→ Sending
//! Sending ──2xx/3xx──────────────────────────→ Success
//! Sending ──auth failure, stamped credential─→ AuthRetry ──→ Adapting
//! Sending ──error status / transport error───→ Retry ──→ Sending
//! any ──bound reached / DoNotRetry / AuthError→ Failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::auth::Authenticator;
use crate::chain::cancel::CancelToken;
use crate::chain::context::{CallState, RequestContext};
use crate::chain::coordinator::RefreshCoordinator;
use crate::config::InterceptorConfig;
use crate::credential::{Credential, CredentialStore};
use crate::error::{ChainError, ChainResult};
use crate::http::{
    DefaultHeadersAdapter, PreparedRequest, RawResponse, RequestAdapter, RequestDescriptor,
    Transport,
};
use crate::observability::metrics;
use crate::observability::{EventObserver, ObserverSet, RequestOutcome};
use crate::resilience::{BackoffRetryPolicy, NeverRetry, RetryCause, RetryDecision, RetryPolicy};

/// Retries allowed per call when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Orchestrates authentication, adaptation, sending and retries for every call.
///
/// Shared by reference (or `Arc`) between any number of concurrent calls.
pub struct InterceptorChain {
    transport: Arc<dyn Transport>,
    coordinator: Option<RefreshCoordinator>,
    adapters: Vec<Arc<dyn RequestAdapter>>,
    retry_policy: Arc<dyn RetryPolicy>,
    observers: ObserverSet,
    max_retries: u32,
}

impl InterceptorChain {
    pub fn builder(transport: Arc<dyn Transport>) -> InterceptorChainBuilder {
        InterceptorChainBuilder::new(transport)
    }

    /// Add an observer. Observers cannot be removed.
    pub fn register_observer(&self, observer: Arc<dyn EventObserver>) {
        self.observers.register(observer);
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The store credentials are read from, if the chain authenticates.
    pub fn credential_store(&self) -> Option<&Arc<dyn CredentialStore>> {
        self.coordinator.as_ref().map(RefreshCoordinator::store)
    }

    /// Whether a credential refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.coordinator
            .as_ref()
            .is_some_and(RefreshCoordinator::is_refreshing)
    }

    /// Send `descriptor` and decode the JSON response into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> ChainResult<T> {
        let (request, response) = self.dispatch(descriptor).await?;

        let decoded = response.json::<T>();
        if let Err(e) = &decoded {
            tracing::warn!(url = %request.url(), status = response.status.as_u16(), error = %e, "Response decoding failed");
        }
        self.observers
            .response_parsed(&request, &response, decoded.as_ref().map(|_| ()));
        decoded
    }

    /// Send `descriptor` and return the successful response undecoded.
    pub async fn execute_raw(&self, descriptor: &RequestDescriptor) -> ChainResult<RawResponse> {
        self.dispatch(descriptor)
            .await
            .map(|(_, response)| response)
    }

    /// Like `execute`, but gives up with `ChainError::Cancelled` once `cancel` fires.
    ///
    /// A refresh this call started or joined keeps running for the other callers.
    pub async fn execute_cancellable<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
        cancel: &CancelToken,
    ) -> ChainResult<T> {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled);
        }
        let started = std::time::Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(method = %descriptor.method, path = %descriptor.path, "Call cancelled");
                metrics::record_request(descriptor.method.as_str(), "cancelled", started);
                Err(ChainError::Cancelled)
            }
            result = self.execute(descriptor) => result,
        }
    }

    async fn dispatch(&self, descriptor: &RequestDescriptor) -> ChainResult<(PreparedRequest, RawResponse)> {
        let prepared = descriptor.prepare()?;
        let mut ctx = RequestContext::new(prepared, self.max_retries);
        self.retry_policy.record_request();

        let result = self.run(&mut ctx).await;

        let outcome = match &result {
            Ok(_) => {
                ctx.transition(CallState::Success);
                "success"
            }
            Err(e) => {
                ctx.transition(CallState::Failed);
                outcome_label(e)
            }
        };
        metrics::record_request(ctx.request().method().as_str(), outcome, ctx.started());
        tracing::debug!(
            call_id = %ctx.call_id(),
            method = %ctx.request().method(),
            url = %ctx.request().url(),
            attempts = ctx.attempts(),
            auth_retries = ctx.auth_retries(),
            generic_retries = ctx.generic_retries(),
            outcome,
            "Call finished"
        );

        result.map(|response| (ctx.request().clone(), response))
    }

    async fn run(&self, ctx: &mut RequestContext) -> ChainResult<RawResponse> {
        let mut credential = match &self.coordinator {
            Some(coordinator) => Some(coordinator.current().await?),
            None => None,
        };

        'adapting: loop {
            ctx.transition(CallState::Adapting);
            let adapted = self.adapt(ctx.request().clone(), credential.as_deref())?;
            ctx.stamp(adapted, credential.clone());

            loop {
                ctx.transition(CallState::Sending);
                ctx.record_attempt();
                self.observers.request_start(ctx.request());

                let failure = match self.transport.send(ctx.request()).await {
                    Ok(response) => {
                        self.observers
                            .request_finish(ctx.request(), RequestOutcome::Response(&response));

                        if let Some(coordinator) = self.stale_credential(ctx, &response) {
                            if !ctx.consume_auth_retry() {
                                tracing::warn!(
                                    call_id = %ctx.call_id(),
                                    status = response.status.as_u16(),
                                    auth_retries = ctx.auth_retries(),
                                    "Credential rejected, retries exhausted"
                                );
                                return Err(ChainError::AuthRejected {
                                    status: response.status,
                                    auth_retries: ctx.auth_retries(),
                                });
                            }
                            ctx.transition(CallState::AuthRetry);
                            metrics::record_retry("auth");
                            tracing::info!(
                                call_id = %ctx.call_id(),
                                status = response.status.as_u16(),
                                auth_retry = ctx.auth_retries(),
                                "Credential rejected, refreshing"
                            );
                            credential = Some(coordinator.replace(ctx.credential()).await?);
                            continue 'adapting;
                        }

                        if !response.is_error() {
                            return Ok(response);
                        }
                        response.into_status_error()
                    }
                    Err(e) => {
                        self.observers
                            .request_finish(ctx.request(), RequestOutcome::Failed(&e));
                        tracing::warn!(call_id = %ctx.call_id(), attempt = ctx.attempts(), error = %e, "Transport error");
                        ChainError::Transport(e)
                    }
                };

                self.await_retry(ctx, failure).await?;
            }
        }
    }

    /// Authenticator first, then adapters in registration order.
    fn adapt(&self, request: PreparedRequest, credential: Option<&Credential>) -> ChainResult<PreparedRequest> {
        let mut request = match (&self.coordinator, credential) {
            (Some(coordinator), Some(credential)) => {
                coordinator.authenticator().adapt(request, credential)?
            }
            _ => request,
        };
        for adapter in &self.adapters {
            request = adapter.adapt(request).map_err(|e| {
                tracing::warn!(adapter = adapter.name(), error = %e, "Request adapter failed");
                e
            })?;
        }
        Ok(request)
    }

    /// The coordinator to refresh through, if `response` rejects the credential the
    /// request was stamped with.
    fn stale_credential(&self, ctx: &RequestContext, response: &RawResponse) -> Option<&RefreshCoordinator> {
        let coordinator = self.coordinator.as_ref()?;
        let authenticator = coordinator.authenticator();
        let stamped = ctx.credential()?;
        (authenticator.is_auth_failure(ctx.request(), response)
            && authenticator.matches_credential(ctx.request(), stamped))
        .then_some(coordinator)
    }

    /// Consult the retry policy about `failure`. `Ok` means send again.
    async fn await_retry(&self, ctx: &mut RequestContext, failure: ChainError) -> ChainResult<()> {
        let cause = match &failure {
            ChainError::Transport(e) => RetryCause::Transport(e),
            ChainError::Status { status, .. } => RetryCause::Status(*status),
            _ => return Err(failure),
        };

        if !ctx.can_retry() {
            return Err(give_up(ctx, failure));
        }

        let delay = match self.retry_policy.decide(ctx.request(), cause, ctx.attempts()) {
            RetryDecision::DoNotRetry => return Err(give_up(ctx, failure)),
            RetryDecision::RetryNow => Duration::ZERO,
            RetryDecision::RetryAfter(delay) => delay,
        };

        if !ctx.consume_generic_retry() {
            return Err(give_up(ctx, failure));
        }
        ctx.transition(CallState::Retry);
        metrics::record_retry("generic");
        tracing::info!(
            call_id = %ctx.call_id(),
            attempt = ctx.attempts(),
            delay = ?delay,
            error = %failure,
            "Retrying request"
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// The terminal error for a failure that will not be retried.
fn give_up(ctx: &RequestContext, failure: ChainError) -> ChainError {
    if ctx.generic_retries() == 0 {
        return failure;
    }
    ChainError::PolicyExhausted {
        attempts: ctx.attempts(),
        last: Box::new(failure),
    }
}

fn outcome_label(error: &ChainError) -> &'static str {
    match error {
        ChainError::InvalidRequest(_) => "invalid_request",
        ChainError::Transport(_) => "transport_error",
        ChainError::Status { .. } => "status_error",
        ChainError::Auth(_) => "auth_error",
        ChainError::AuthRejected { .. } => "auth_rejected",
        ChainError::Decode(_) => "decode_error",
        ChainError::PolicyExhausted { .. } => "exhausted",
        ChainError::Cancelled => "cancelled",
    }
}

/// Builds an `InterceptorChain`.
pub struct InterceptorChainBuilder {
    transport: Arc<dyn Transport>,
    coordinator: Option<RefreshCoordinator>,
    adapters: Vec<Arc<dyn RequestAdapter>>,
    retry_policy: Arc<dyn RetryPolicy>,
    observers: Vec<Arc<dyn EventObserver>>,
    max_retries: u32,
}

impl InterceptorChainBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            coordinator: None,
            adapters: Vec::new(),
            retry_policy: Arc::new(NeverRetry),
            observers: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Authenticate every request with credentials from `store`.
    pub fn authenticator(
        mut self,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        self.coordinator = Some(RefreshCoordinator::new(authenticator, store));
        self
    }

    /// Append an adapter. Adapters run in the order they are added.
    pub fn adapter(mut self, adapter: Arc<dyn RequestAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Bound on auth and generic retries combined, per call.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Apply the retry settings and default headers of `config`.
    pub fn with_config(mut self, config: &InterceptorConfig) -> ChainResult<Self> {
        self.max_retries = config.retries.max_retries;
        if config.retries.enabled {
            self.retry_policy = Arc::new(BackoffRetryPolicy::new(&config.retries));
        }
        let defaults = DefaultHeadersAdapter::from_config(&config.default_headers)?;
        self.adapters.push(Arc::new(defaults));
        Ok(self)
    }

    pub fn build(self) -> InterceptorChain {
        let observers = ObserverSet::new();
        for observer in self.observers {
            observers.register(observer);
        }

        tracing::debug!(
            authenticated = self.coordinator.is_some(),
            adapters = self.adapters.len(),
            observers = observers.len(),
            max_retries = self.max_retries,
            "Interceptor chain built"
        );

        InterceptorChain {
            transport: self.transport,
            coordinator: self.coordinator,
            adapters: self.adapters,
            retry_policy: self.retry_policy,
            observers,
            max_retries: self.max_retries,
        }
    }
}
