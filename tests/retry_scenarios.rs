//! End-to-end call scenarios against scripted fakes.
//!
//! Time is paused, so retry delays and slow refreshes complete instantly while
//! elapsed time is still measurable.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderName;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::Instant;

use http_interceptor::auth::AuthError;
use http_interceptor::chain::{CancelToken, InterceptorChain};
use http_interceptor::config::InterceptorConfig;
use http_interceptor::credential::CredentialStore;
use http_interceptor::error::ChainError;
use http_interceptor::http::{RequestDescriptor, RequestIdAdapter, TransportError};
use http_interceptor::resilience::RetryDecision;

mod common;
use common::*;

#[derive(Debug, Deserialize)]
struct Profile {
    name: String,
}

#[tokio::test(start_paused = true)]
async fn test_expiring_credential_is_refreshed_before_first_send() {
    let refresher = CountingRefresher::new(Duration::from_secs(1));
    let store = store_with(expiring("old"));
    let transport = ScriptedTransport::with_handler(accepts_only("fresh-1"));
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store.clone())
        .build();

    chain.execute_raw(&get("/profile")).await.unwrap();

    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.authorizations(), vec!["Bearer fresh-1"]);
    assert_eq!(store.get().unwrap().access_token(), "fresh-1");
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_refreshes_and_retries_once() {
    let refresher = CountingRefresher::new(Duration::from_millis(200));
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::new(vec![status(401), ok_json(r#"{"name": "paige"}"#)]);
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store)
        .build();

    let profile: Profile = chain.execute(&get("/profile")).await.unwrap();

    assert_eq!(profile.name, "paige");
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.authorizations(), vec!["Bearer a1", "Bearer fresh-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_with_failing_refresh() {
    let refresher = CountingRefresher::failing(Duration::ZERO, refresh_expired());
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::with_handler(accepts_only("never"));
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store)
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    assert!(matches!(err, ChainError::Auth(AuthError::RefreshRejected { status: 401, .. })));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_auth_failure_is_rejected_at_bound() {
    let refresher = CountingRefresher::new(Duration::ZERO);
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::with_handler(accepts_only("never"));
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store)
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    match err {
        ChainError::AuthRejected { status, auth_retries } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(auth_retries, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(refresher.calls(), 2);
    assert_eq!(
        transport.authorizations(),
        vec!["Bearer a1", "Bearer fresh-1", "Bearer fresh-2"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_twice_then_stop() {
    let policy = ScheduledPolicy::new(vec![
        RetryDecision::RetryAfter(Duration::from_secs(2)),
        RetryDecision::RetryAfter(Duration::from_secs(2)),
    ]);
    let transport = ScriptedTransport::new(vec![connect_error(), connect_error(), connect_error()]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(policy.clone())
        .max_retries(5)
        .build();

    let started = Instant::now();
    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    match err {
        ChainError::PolicyExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ChainError::Transport(TransportError::Connect(_))));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(policy.seen(), vec![1, 2, 3]);
    assert_eq!(transport.sent_count(), 3);
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_bound_caps_policy_retries() {
    let policy = ScheduledPolicy::new(vec![RetryDecision::RetryAfter(Duration::from_secs(1)); 5]);
    let transport = ScriptedTransport::new(vec![status(503); 5]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(policy.clone())
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    assert!(matches!(err, ChainError::PolicyExhausted { attempts: 3, .. }));
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(policy.seen(), vec![1, 2]);
    assert_eq!(transport.sent_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_bound_is_shared_by_auth_and_generic_retries() {
    let refresher = CountingRefresher::new(Duration::ZERO);
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::new(vec![status(401), status(503), status(503), status(503)]);
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store)
        .retry_policy(Arc::new(RetryForever))
        .max_retries(2)
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    assert!(matches!(err, ChainError::PolicyExhausted { attempts: 3, .. }));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.sent_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_do_not_retry_returns_original_error() {
    let policy = ScheduledPolicy::new(vec![]);
    let transport = ScriptedTransport::new(vec![status(503)]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(policy.clone())
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    assert!(matches!(err, ChainError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(policy.seen(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_401_goes_to_policy() {
    let policy = ScheduledPolicy::new(vec![]);
    let transport = ScriptedTransport::new(vec![status(401)]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(policy.clone())
        .build();

    let err = chain.execute_raw(&get("/profile")).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(matches!(err, ChainError::Status { .. }));
    assert_eq!(policy.seen(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_decode_error_is_terminal() {
    let transport = ScriptedTransport::new(vec![ok_json(r#"{"unexpected": 1}"#)]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(Arc::new(RetryForever))
        .build();

    let err = chain.execute::<Profile>(&get("/profile")).await.unwrap_err();

    assert!(matches!(err, ChainError::Decode(_)));
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_policy_from_config() {
    let mut config = InterceptorConfig::default();
    config.retries.enabled = true;
    config.retries.max_retries = 3;
    config.retries.base_delay_ms = 100;

    let transport = ScriptedTransport::new(vec![status(503), status(503), ok_json("{}")]);
    let chain = InterceptorChain::builder(transport.clone())
        .with_config(&config)
        .unwrap()
        .build();

    let started = Instant::now();
    chain.execute_raw(&get("/items")).await.unwrap();

    assert_eq!(transport.sent_count(), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(transport.sent()[0].header_str(&reqwest::header::ACCEPT), Some("application/json"));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_policy_skips_post() {
    let mut config = InterceptorConfig::default();
    config.retries.enabled = true;

    let transport = ScriptedTransport::new(vec![status(503), ok_json("{}")]);
    let chain = InterceptorChain::builder(transport.clone())
        .with_config(&config)
        .unwrap()
        .build();

    let post = RequestDescriptor::post(base_url(), "/items")
        .with_body(&serde_json::json!({"name": "widget"}))
        .unwrap();
    let err = chain.execute_raw(&post).await.unwrap_err();

    assert!(matches!(err, ChainError::Status { .. }));
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_id_survives_auth_retry() {
    let refresher = CountingRefresher::new(Duration::ZERO);
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::new(vec![status(401), ok_json("{}")]);
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher), store)
        .adapter(Arc::new(RequestIdAdapter))
        .build();

    chain.execute_raw(&get("/profile")).await.unwrap();

    let name = HeaderName::from_static("x-request-id");
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let first = sent[0].header_str(&name).unwrap();
    assert!(!first.is_empty());
    assert_eq!(Some(first), sent[1].header_str(&name));
}

#[tokio::test(start_paused = true)]
async fn test_observer_failures_are_swallowed() {
    let refresher = CountingRefresher::new(Duration::ZERO);
    let store = store_with(valid("a1"));
    let transport = ScriptedTransport::new(vec![status(401), ok_json(r#"{"name": "paige"}"#)]);
    let recording = Arc::new(RecordingObserver::default());
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher), store)
        .observer(Arc::new(PanickingObserver))
        .build();
    chain.register_observer(recording.clone());

    let profile: Profile = chain.execute(&get("/profile")).await.unwrap();
    assert_eq!(profile.name, "paige");

    assert_eq!(recording.starts.load(Ordering::SeqCst), 2);
    assert_eq!(recording.finishes.load(Ordering::SeqCst), 2);
    assert_eq!(recording.parsed_ok.load(Ordering::SeqCst), 1);

    let transport = ScriptedTransport::new(vec![ok_json("[]")]);
    let chain = InterceptorChain::builder(transport)
        .observer(recording.clone())
        .build();
    assert!(chain.execute::<Profile>(&get("/profile")).await.is_err());
    assert_eq!(recording.parsed_err.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_delay() {
    let policy = ScheduledPolicy::new(vec![RetryDecision::RetryAfter(Duration::from_secs(10))]);
    let transport = ScriptedTransport::new(vec![connect_error(), ok_json("{}")]);
    let chain = InterceptorChain::builder(transport.clone())
        .retry_policy(policy)
        .build();

    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = chain
        .execute_cancellable::<serde_json::Value>(&get("/profile"), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_leaves_refresh_running() {
    let refresher = CountingRefresher::new(Duration::from_secs(5));
    let store = store_with(expiring("old"));
    let transport = ScriptedTransport::with_handler(accepts_only("fresh-1"));
    let chain = InterceptorChain::builder(transport.clone())
        .authenticator(bearer(refresher.clone()), store.clone())
        .build();

    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let descriptor = get("/profile");
    let (cancelled, completed) = tokio::join!(
        chain.execute_cancellable::<serde_json::Value>(&descriptor, &token),
        chain.execute::<serde_json::Value>(&descriptor),
    );

    assert!(matches!(cancelled.unwrap_err(), ChainError::Cancelled));
    assert_eq!(completed.unwrap()["ok"], true);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.authorizations(), vec!["Bearer fresh-1"]);
    assert_eq!(store.get().unwrap().access_token(), "fresh-1");
}
