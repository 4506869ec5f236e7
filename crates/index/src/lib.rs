//! Fingerprint-band hashtable storage for Gemini.
//!
//! The index maps `(hashtable_id, band_bytes)` to the content hashes whose
//! sketches produced that band, plus a `meta` table resolving content hashes
//! back to repository provenance and a persisted copy of the
//! document-frequency vocabulary. Storage is abstracted behind the
//! [`StoreBackend`] trait so the same query and report code runs against the
//! in-memory backend (tests, ephemeral runs) and the embedded redb backend.
//!
//! ## Collision semantics
//!
//! Band values are raw sketch bytes and are compared for exact equality; a
//! lookup returns every content hash ever upserted under that exact
//! `(hashtable, value)` pair. Scans stream rows in primary-key order,
//! `(hashtable, value, sha)`, which is what lets the report stage group
//! collision buckets without materializing the table.
//!
//! ## Failure semantics
//!
//! Transport faults surface as [`StoreError::Unavailable`] and are retried
//! with exponential backoff at the [`Store`] boundary (writes and point
//! lookups are idempotent). A scan that dies mid-way surfaces
//! [`StoreError::ScanInterrupted`] and is never silently partial.

mod backend;
mod retry;

pub use crate::backend::MemoryBackend;
#[cfg(feature = "backend-redb")]
pub use crate::backend::RedbBackend;
pub use crate::backend::{BackendConfig, StoreBackend};
pub use crate::retry::{with_backoff, RetryConfig};

use serde::{Deserialize, Serialize};
use sketch::Mode;
use thiserror::Error;

/// Provenance of a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoFile {
    pub repo: String,
    pub commit: String,
    pub path: String,
    pub sha: String,
}

/// Errors raised by the storage layer.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("scan interrupted: {0}")]
    ScanInterrupted(String),

    #[error("stored data corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Unavailable(err.to_string())
    }

    pub fn interrupted<E: std::fmt::Display>(err: E) -> Self {
        StoreError::ScanInterrupted(err.to_string())
    }

    /// Whether a retry at the call boundary can help.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Store façade: a backend plus the retry policy applied at the boundary.
///
/// Point operations (upserts, lookups, meta resolution, docfreq persistence)
/// are idempotent and retried on transient failure; scans are not retried
/// because a partial scan must never be stitched together.
pub struct Store {
    backend: Box<dyn StoreBackend>,
    retry: RetryConfig,
}

impl Store {
    pub fn new(cfg: BackendConfig) -> Result<Self, StoreError> {
        Ok(Self::with_backend(cfg.build()?))
    }

    pub fn with_backend(backend: Box<dyn StoreBackend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    /// Insert one band row per hashtable for `sha`.
    pub fn upsert_bands(&self, mode: Mode, sha: &str, bands: &[Vec<u8>]) -> Result<(), StoreError> {
        with_backoff(&self.retry, || self.backend.upsert_bands(mode, sha, bands))
    }

    /// Stream every content hash colliding with `(hashtable, value)`.
    ///
    /// Retried as a whole on transient failure; collision sets are unioned
    /// downstream, so a replayed prefix is harmless.
    pub fn lookup(
        &self,
        mode: Mode,
        hashtable: u32,
        value: &[u8],
        visit: &mut dyn FnMut(&str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        with_backoff(&self.retry, || {
            self.backend.lookup(mode, hashtable, value, &mut *visit)
        })
    }

    pub fn scan_bands(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.backend.scan_bands(mode, visit)
    }

    pub fn scan_buckets(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &[String]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.backend.scan_buckets(mode, visit)
    }

    pub fn insert_meta(&self, file: &RepoFile) -> Result<(), StoreError> {
        with_backoff(&self.retry, || self.backend.insert_meta(file))
    }

    pub fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, StoreError> {
        with_backoff(&self.retry, || self.backend.find_by_content_hash(sha))
    }

    pub fn scan_meta(
        &self,
        visit: &mut dyn FnMut(&RepoFile) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.backend.scan_meta(visit)
    }

    pub fn put_docfreq(&self, mode: Mode, docs: u64, df: &[(String, u64)]) -> Result<(), StoreError> {
        with_backoff(&self.retry, || self.backend.put_docfreq(mode, docs, df))
    }

    pub fn get_docfreq(&self, mode: Mode) -> Result<Option<(u64, Vec<(String, u64)>)>, StoreError> {
        with_backoff(&self.retry, || self.backend.get_docfreq(mode))
    }

    /// Drop the band keyspace for `mode` ahead of a full re-hash.
    pub fn drop_hashtables(&self, mode: Mode) -> Result<(), StoreError> {
        with_backoff(&self.retry, || self.backend.drop_hashtables(mode))
    }
}
