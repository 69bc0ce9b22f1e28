//! Credential storage.
//!
//! # Responsibilities
//! - Hold the current credential behind an atomically swapped reference
//! - Optionally persist it to a JSON file so it survives restarts
//!
//! Readers always observe either the old or the new credential, never a mix.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::credential::types::Credential;

/// Source of truth for the current credential.
pub trait CredentialStore: Send + Sync {
    /// Snapshot of the current credential.
    fn get(&self) -> Option<Arc<Credential>>;

    /// Replace the current credential.
    fn set(&self, credential: Credential);
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    current: ArcSwapOption<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(credential),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Arc<Credential>> {
        self.current.load_full()
    }

    fn set(&self, credential: Credential) {
        self.current.store(Some(Arc::new(credential)));
    }
}

/// Store backed by a JSON file.
///
/// The file is read once on load. Every `set` swaps the in-memory reference first
/// and then rewrites the file through a temporary sibling.
pub struct FileCredentialStore {
    path: PathBuf,
    current: ArcSwapOption<Credential>,
}

impl FileCredentialStore {
    /// Load from file if it exists, starting empty otherwise.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let current = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let credential: Credential = serde_json::from_reader(reader)?;
            tracing::info!(path = %path.display(), "Loaded credential from file");
            Some(Arc::new(credential))
        } else {
            None
        };

        Ok(Self {
            path,
            current: ArcSwapOption::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, credential: &Credential) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, credential)?;
        }
        fs::rename(&tmp, &self.path)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Arc<Credential>> {
        self.current.load_full()
    }

    fn set(&self, credential: Credential) {
        let credential = Arc::new(credential);
        self.current.store(Some(Arc::clone(&credential)));
        if let Err(e) = self.persist(&credential) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist credential");
        }
    }
}
