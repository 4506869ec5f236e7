//! Storage backends for the fingerprint index.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use sketch::Mode;

use crate::{RepoFile, StoreError};

/// Object-safe storage contract for the hashtable, meta, and docfreq tables.
///
/// Streaming operations take a visitor so no backend ever has to materialize
/// a full collision list or table scan; a bucket with a million collisions
/// flows through one row at a time.
pub trait StoreBackend: Send + Sync {
    /// Insert `(h, bands[h], sha)` for every hashtable `h`. Idempotent.
    fn upsert_bands(&self, mode: Mode, sha: &str, bands: &[Vec<u8>]) -> Result<(), StoreError>;

    /// Stream all shas stored under exactly `(hashtable, value)`.
    fn lookup(
        &self,
        mode: Mode,
        hashtable: u32,
        value: &[u8],
        visit: &mut dyn FnMut(&str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Stream every `(hashtable, value, sha)` row in primary-key order.
    fn scan_bands(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Stream collision buckets of size ≥ 2, grouped backend-side.
    ///
    /// The default groups the ordered [`StoreBackend::scan_bands`] stream;
    /// backends with a native group-by may override it. Either way the
    /// output must match the grouped strategy row for row.
    fn scan_buckets(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &[String]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        fn flush(
            key: &Option<(u32, Vec<u8>)>,
            members: &mut Vec<String>,
            visit: &mut dyn FnMut(u32, &[u8], &[String]) -> Result<(), StoreError>,
        ) -> Result<(), StoreError> {
            if let Some((ht, value)) = key {
                if members.len() >= 2 {
                    visit(*ht, value, members)?;
                }
            }
            members.clear();
            Ok(())
        }

        let mut current: Option<(u32, Vec<u8>)> = None;
        let mut members: Vec<String> = Vec::new();

        self.scan_bands(mode, &mut |ht, value, sha| {
            let same = matches!(&current, Some((h, v)) if *h == ht && v.as_slice() == value);
            if !same {
                flush(&current, &mut members, &mut *visit)?;
                current = Some((ht, value.to_vec()));
            }
            members.push(sha.to_string());
            Ok(())
        })?;
        flush(&current, &mut members, visit)
    }

    /// Record provenance for a content hash. Idempotent per `(repo, commit, path)`.
    fn insert_meta(&self, file: &RepoFile) -> Result<(), StoreError>;

    /// All provenance rows for `sha`.
    fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, StoreError>;

    /// Stream provenance rows ordered by sha.
    fn scan_meta(
        &self,
        visit: &mut dyn FnMut(&RepoFile) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Persist the document-frequency vocabulary for `mode`.
    fn put_docfreq(&self, mode: Mode, docs: u64, df: &[(String, u64)]) -> Result<(), StoreError>;

    /// Load the persisted vocabulary for `mode`, if any.
    fn get_docfreq(&self, mode: Mode) -> Result<Option<(u64, Vec<(String, u64)>)>, StoreError>;

    /// Drop every band row for `mode`.
    fn drop_hashtables(&self, mode: Mode) -> Result<(), StoreError>;
}

/// Backend selection.
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// Ordered in-memory tables. Used by tests and ephemeral runs.
    #[default]
    InMemory,
    /// Embedded redb database at `path`.
    ///
    /// Requires the `backend-redb` feature (enabled by default).
    Redb { path: std::path::PathBuf },
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<std::path::PathBuf>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    pub fn build(&self) -> Result<Box<dyn StoreBackend>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(MemoryBackend::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::Unavailable(
                        "redb backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }
}

type BandRow = (u32, Vec<u8>, String);

/// In-memory backend over ordered sets, mirroring the on-disk key order.
pub struct MemoryBackend {
    file_bands: RwLock<BTreeSet<BandRow>>,
    func_bands: RwLock<BTreeSet<BandRow>>,
    meta: RwLock<BTreeMap<String, Vec<RepoFile>>>,
    docfreq: RwLock<BTreeMap<&'static str, (u64, Vec<(String, u64)>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            file_bands: RwLock::new(BTreeSet::new()),
            func_bands: RwLock::new(BTreeSet::new()),
            meta: RwLock::new(BTreeMap::new()),
            docfreq: RwLock::new(BTreeMap::new()),
        }
    }

    fn bands(&self, mode: Mode) -> &RwLock<BTreeSet<BandRow>> {
        match mode {
            Mode::File => &self.file_bands,
            Mode::Func => &self.func_bands,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    fn upsert_bands(&self, mode: Mode, sha: &str, bands: &[Vec<u8>]) -> Result<(), StoreError> {
        let mut guard = self
            .bands(mode)
            .write()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        for (h, band) in bands.iter().enumerate() {
            guard.insert((h as u32, band.clone(), sha.to_string()));
        }
        Ok(())
    }

    fn lookup(
        &self,
        mode: Mode,
        hashtable: u32,
        value: &[u8],
        visit: &mut dyn FnMut(&str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .bands(mode)
            .read()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        let lo = (hashtable, value.to_vec(), String::new());
        for (h, v, sha) in guard.range(lo..) {
            if *h != hashtable || v.as_slice() != value {
                break;
            }
            visit(sha)?;
        }
        Ok(())
    }

    fn scan_bands(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .bands(mode)
            .read()
            .map_err(|_| StoreError::interrupted("poisoned lock"))?;
        for (h, v, sha) in guard.iter() {
            visit(*h, v, sha)?;
        }
        Ok(())
    }

    fn insert_meta(&self, file: &RepoFile) -> Result<(), StoreError> {
        let mut guard = self
            .meta
            .write()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        let rows = guard.entry(file.sha.clone()).or_default();
        if !rows.iter().any(|f| f == file) {
            rows.push(file.clone());
        }
        Ok(())
    }

    fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, StoreError> {
        let guard = self
            .meta
            .read()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        Ok(guard.get(sha).cloned().unwrap_or_default())
    }

    fn scan_meta(
        &self,
        visit: &mut dyn FnMut(&RepoFile) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .meta
            .read()
            .map_err(|_| StoreError::interrupted("poisoned lock"))?;
        for rows in guard.values() {
            for row in rows {
                visit(row)?;
            }
        }
        Ok(())
    }

    fn put_docfreq(&self, mode: Mode, docs: u64, df: &[(String, u64)]) -> Result<(), StoreError> {
        let mut guard = self
            .docfreq
            .write()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        guard.insert(mode.as_str(), (docs, df.to_vec()));
        Ok(())
    }

    fn get_docfreq(&self, mode: Mode) -> Result<Option<(u64, Vec<(String, u64)>)>, StoreError> {
        let guard = self
            .docfreq
            .read()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        Ok(guard.get(mode.as_str()).cloned())
    }

    fn drop_hashtables(&self, mode: Mode) -> Result<(), StoreError> {
        let mut guard = self
            .bands(mode)
            .write()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        guard.clear();
        Ok(())
    }
}

#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use self::redb::RedbBackend;
