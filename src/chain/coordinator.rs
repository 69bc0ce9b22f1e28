//! Refresh coordination.
//!
//! # Responsibilities
//! - Guarantee at most one in-flight `Authenticator::refresh` at a time
//! - Deliver one refresh outcome, success or error, to every waiter
//! - Skip refreshing when the store already holds a newer valid credential
//!
//! # Protocol
//! ```text
//! lock pending
//!     store holds a valid credential other than the stale one → return it
//!     a PendingRefresh exists                                  → attach as waiter
//!     otherwise                                                → create it, spawn the refresh
//! unlock
//! wait on the completion signal
//!
//! refresh task: refresh → store.set on success → clear pending → broadcast outcome
//! ```
//!
//! # Design Decisions
//! - The lock guards only check-or-create; refresh never runs under it
//! - The refresh runs in its own task, so a cancelled caller does not cancel it
//! - A guard clears the pending slot even if the refresh task panics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::watch;

use crate::auth::{AuthError, Authenticator};
use crate::credential::{Credential, CredentialStore};
use crate::observability::metrics;

type RefreshOutcome = Result<Arc<Credential>, AuthError>;

/// An in-flight refresh. Exists only until its outcome is broadcast.
struct PendingRefresh {
    generation: u64,
    outcome: watch::Receiver<Option<RefreshOutcome>>,
}

type PendingSlot = Arc<Mutex<Option<PendingRefresh>>>;

/// Clears the pending slot on drop, if it still holds this generation.
struct PendingGuard {
    slot: PendingSlot,
    generation: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().map(|p| p.generation) == Some(self.generation) {
            *pending = None;
        }
    }
}

/// Serializes credential refreshes across all concurrent calls of a chain.
pub struct RefreshCoordinator {
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn CredentialStore>,
    pending: PendingSlot,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(authenticator: Arc<dyn Authenticator>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            authenticator,
            store,
            pending: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current credential if valid, otherwise the outcome of a (shared) refresh.
    pub async fn current(&self) -> RefreshOutcome {
        let current = self.store.get();
        if let Some(credential) = &current {
            if self.authenticator.is_valid(Some(credential.as_ref())) {
                return Ok(Arc::clone(credential));
            }
        }
        self.replace(current.as_ref()).await
    }

    /// A credential to use instead of `stale`.
    ///
    /// Returns the stored credential without refreshing when another call already
    /// replaced `stale` with a valid one.
    pub async fn replace(&self, stale: Option<&Arc<Credential>>) -> RefreshOutcome {
        let mut outcome = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

            let current = self.store.get();
            if let Some(current) = &current {
                let rotated = stale.map_or(true, |stale| stale.as_ref() != current.as_ref());
                if rotated && self.authenticator.is_valid(Some(current.as_ref())) {
                    tracing::debug!("Credential already replaced, skipping refresh");
                    return Ok(Arc::clone(current));
                }
            }

            match pending.as_ref() {
                Some(existing) => {
                    tracing::debug!(generation = existing.generation, "Waiting for in-flight refresh");
                    existing.outcome.clone()
                }
                None => {
                    let base = match current.or_else(|| stale.cloned()) {
                        Some(base) => base,
                        None => return Err(AuthError::MissingCredential),
                    };
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let (tx, rx) = watch::channel(None);
                    *pending = Some(PendingRefresh {
                        generation,
                        outcome: rx.clone(),
                    });
                    self.spawn_refresh(generation, base, tx);
                    rx
                }
            }
        };

        let resolved = match outcome.wait_for(Option::is_some).await {
            Ok(resolved) => (*resolved).clone().unwrap_or(Err(AuthError::Aborted)),
            Err(_) => Err(AuthError::Aborted),
        };
        resolved
    }

    fn spawn_refresh(
        &self,
        generation: u64,
        base: Arc<Credential>,
        tx: watch::Sender<Option<RefreshOutcome>>,
    ) {
        let authenticator = Arc::clone(&self.authenticator);
        let store = Arc::clone(&self.store);
        let guard = PendingGuard {
            slot: Arc::clone(&self.pending),
            generation,
        };

        tokio::spawn(async move {
            let started = Instant::now();
            tracing::info!(generation, "Refreshing credential");

            let outcome = match authenticator.refresh(&base).await {
                Ok(fresh) => {
                    store.set(fresh.clone());
                    metrics::record_refresh("success");
                    tracing::info!(
                        generation,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        expires_in_secs = fresh.remaining().as_secs(),
                        "Credential refreshed"
                    );
                    Ok(Arc::new(fresh))
                }
                Err(e) => {
                    metrics::record_refresh("failure");
                    tracing::warn!(generation, error = %e, "Credential refresh failed");
                    Err(e)
                }
            };

            drop(guard);
            tx.send_replace(Some(outcome));
        });
    }
}
