//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! FileCredentialStore::load / MemoryCredentialStore::with_credential
//!     → CredentialStore::get (Arc snapshot, lock-free)
//!     → chain checks validity, adapts requests
//!     → refresh produces a new Credential
//!     → CredentialStore::set (atomic swap, optional persistence)
//! ```
//!
//! # Design Decisions
//! - Credentials are immutable values; snapshots are shared via Arc
//! - Durable storage is an implementation detail of the store

pub mod store;
pub mod types;

pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::Credential;
