//! Event observers.
//!
//! # Responsibilities
//! - Define lifecycle callbacks (request started, request finished, response parsed)
//! - Fan events out to every registered observer
//! - Contain observer failures: errors and panics are logged, never propagated
//!
//! # Design Decisions
//! - Observers are registered at any time through a lock-free swap of the list
//! - Observers cannot influence control flow

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::ChainError;
use crate::http::{PreparedRequest, RawResponse, TransportError};

/// Error an observer may report. Only ever logged.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single send.
#[derive(Debug, Clone, Copy)]
pub enum RequestOutcome<'a> {
    Response(&'a RawResponse),
    Failed(&'a TransportError),
}

/// Receives pipeline lifecycle callbacks for diagnostics.
pub trait EventObserver: Send + Sync {
    fn on_request_start(&self, _request: &PreparedRequest) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_request_finish(
        &self,
        _request: &PreparedRequest,
        _outcome: RequestOutcome<'_>,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_response_parsed(
        &self,
        _request: &PreparedRequest,
        _response: &RawResponse,
        _result: Result<(), &ChainError>,
    ) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// The registered observers of a chain.
pub struct ObserverSet {
    observers: ArcSwap<Vec<Arc<dyn EventObserver>>>,
}

impl Default for ObserverSet {
    fn default() -> Self {
        Self {
            observers: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn EventObserver>) {
        self.observers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&observer));
            next
        });
    }

    pub fn len(&self) -> usize {
        self.observers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn request_start(&self, request: &PreparedRequest) {
        self.dispatch("request_start", |o| o.on_request_start(request));
    }

    pub fn request_finish(&self, request: &PreparedRequest, outcome: RequestOutcome<'_>) {
        self.dispatch("request_finish", |o| o.on_request_finish(request, outcome));
    }

    pub fn response_parsed(
        &self,
        request: &PreparedRequest,
        response: &RawResponse,
        result: Result<(), &ChainError>,
    ) {
        self.dispatch("response_parsed", |o| {
            o.on_response_parsed(request, response, result)
        });
    }

    fn dispatch<F>(&self, event: &'static str, f: F)
    where
        F: Fn(&dyn EventObserver) -> Result<(), ObserverError>,
    {
        let observers = self.observers.load();
        for observer in observers.iter() {
            match catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(event, error = %e, "Event observer failed"),
                Err(_) => tracing::error!(event, "Event observer panicked"),
            }
        }
    }
}
