//! Shared fakes and fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use url::Url;

use http_interceptor::auth::{AuthError, BearerAuthenticator, TokenRefresher};
use http_interceptor::credential::{Credential, MemoryCredentialStore};
use http_interceptor::error::ChainError;
use http_interceptor::http::{PreparedRequest, RawResponse, RequestDescriptor, Transport, TransportError};
use http_interceptor::observability::{EventObserver, ObserverError, RequestOutcome};
use http_interceptor::resilience::{RetryCause, RetryDecision, RetryPolicy};

pub const SKEW: Duration = Duration::from_secs(300);

pub fn base_url() -> Url {
    Url::parse("https://api.example.com/v1").unwrap()
}

pub fn get(path: &str) -> RequestDescriptor {
    RequestDescriptor::get(base_url(), path)
}

/// Valid for two hours.
pub fn valid(access: &str) -> Credential {
    Credential::expiring_in(access, format!("{}-refresh", access), Duration::from_secs(7200))
}

/// Inside the refresh skew.
pub fn expiring(access: &str) -> Credential {
    Credential::expiring_in(access, format!("{}-refresh", access), Duration::from_secs(60))
}

pub fn store_with(credential: Credential) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_credential(credential))
}

pub fn ok_json(body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(StatusCode::OK, body.to_string()))
}

pub fn status(code: u16) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(StatusCode::from_u16(code).unwrap(), ""))
}

pub fn connect_error() -> Result<RawResponse, TransportError> {
    Err(TransportError::Connect("connection refused".into()))
}

type Handler = dyn Fn(&PreparedRequest) -> Result<RawResponse, TransportError> + Send + Sync;

/// Transport that answers from a script, then from a handler, and records every send.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    handler: Box<Handler>,
    latency: Duration,
    sent: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    /// Replies in order; `200 null` once the script runs out.
    pub fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            handler: Box::new(|_: &PreparedRequest| ok_json("null")),
            latency: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&PreparedRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self::with_handler_and_latency(handler, Duration::ZERO)
    }

    pub fn with_handler_and_latency<F>(handler: F, latency: Duration) -> Arc<Self>
    where
        F: Fn(&PreparedRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            handler: Box::new(handler),
            latency,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<PreparedRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Authorization header of every send, in order.
    pub fn authorizations(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|r| r.header_str(&AUTHORIZATION).unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => (self.handler)(request),
        }
    }
}

/// Answers 200 for `Bearer <accepted>` and 401 otherwise.
pub fn accepts_only(
    accepted: &'static str,
) -> impl Fn(&PreparedRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static {
    move |request| {
        let expected = format!("Bearer {}", accepted);
        if request.header_str(&AUTHORIZATION) == Some(expected.as_str()) {
            ok_json(r#"{"ok": true}"#)
        } else {
            status(401)
        }
    }
}

/// Issues `fresh-1`, `fresh-2`, ... after a delay, or fails every time.
pub struct CountingRefresher {
    calls: AtomicUsize,
    delay: Duration,
    failure: Option<AuthError>,
}

impl CountingRefresher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            failure: None,
        })
    }

    pub fn failing(delay: Duration, failure: AuthError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            failure: Some(failure),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _credential: &Credential) -> Result<Credential, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(valid(&format!("fresh-{}", n))),
        }
    }
}

pub fn bearer(refresher: Arc<CountingRefresher>) -> Arc<BearerAuthenticator> {
    Arc::new(BearerAuthenticator::new(SKEW, refresher))
}

pub fn refresh_expired() -> AuthError {
    AuthError::RefreshRejected {
        status: 401,
        message: "refresh token expired".into(),
    }
}

/// Replays a fixed list of decisions, then refuses. Records the attempt numbers it saw.
pub struct ScheduledPolicy {
    decisions: Mutex<VecDeque<RetryDecision>>,
    seen: Mutex<Vec<u32>>,
}

impl ScheduledPolicy {
    pub fn new(decisions: Vec<RetryDecision>) -> Arc<Self> {
        Arc::new(Self {
            decisions: Mutex::new(decisions.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<u32> {
        self.seen.lock().unwrap().clone()
    }
}

impl RetryPolicy for ScheduledPolicy {
    fn decide(&self, _request: &PreparedRequest, _cause: RetryCause<'_>, attempt: u32) -> RetryDecision {
        self.seen.lock().unwrap().push(attempt);
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RetryDecision::DoNotRetry)
    }
}

/// Always retries immediately.
pub struct RetryForever;

impl RetryPolicy for RetryForever {
    fn decide(&self, _request: &PreparedRequest, _cause: RetryCause<'_>, _attempt: u32) -> RetryDecision {
        RetryDecision::RetryNow
    }
}

/// Counts lifecycle callbacks.
#[derive(Default)]
pub struct RecordingObserver {
    pub starts: AtomicUsize,
    pub finishes: AtomicUsize,
    pub parsed_ok: AtomicUsize,
    pub parsed_err: AtomicUsize,
}

impl EventObserver for RecordingObserver {
    fn on_request_start(&self, _request: &PreparedRequest) -> Result<(), ObserverError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_request_finish(&self, _request: &PreparedRequest, _outcome: RequestOutcome<'_>) -> Result<(), ObserverError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_response_parsed(
        &self,
        _request: &PreparedRequest,
        _response: &RawResponse,
        result: Result<(), &ChainError>,
    ) -> Result<(), ObserverError> {
        match result {
            Ok(()) => self.parsed_ok.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.parsed_err.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }
}

/// Panics on every callback.
pub struct PanickingObserver;

impl EventObserver for PanickingObserver {
    fn on_request_start(&self, _request: &PreparedRequest) -> Result<(), ObserverError> {
        panic!("observer bug");
    }

    fn on_request_finish(&self, _request: &PreparedRequest, _outcome: RequestOutcome<'_>) -> Result<(), ObserverError> {
        Err("sink unavailable".into())
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn start_mock_backend(router: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Client that never goes through a system proxy.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
