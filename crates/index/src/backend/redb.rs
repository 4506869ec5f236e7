//! Embedded redb backend.
//!
//! redb is a pure Rust ACID key-value store; each logical table from the
//! schema maps to one redb table. Band rows use a composite byte key
//! (4-byte big-endian hashtable id, then the fixed-width band value, then
//! the sha) so redb's lexicographic key order is exactly the
//! `(hashtable, value, sha)` primary-key order the scans rely on.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use sketch::{Mode, ROW_BYTES};

use crate::{RepoFile, StoreBackend, StoreError};

const HASHTABLES_FILE: TableDefinition<&[u8], ()> = TableDefinition::new("hashtables_file");
const HASHTABLES_FUNC: TableDefinition<&[u8], ()> = TableDefinition::new("hashtables_func");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const FEATURES_DOCS: TableDefinition<&str, u64> = TableDefinition::new("features_docs");
const FEATURES_FREQ: TableDefinition<(&str, &str), u32> = TableDefinition::new("features_freq");

fn bands_table(mode: Mode) -> TableDefinition<'static, &'static [u8], ()> {
    match mode {
        Mode::File => HASHTABLES_FILE,
        Mode::Func => HASHTABLES_FUNC,
    }
}

fn band_width(mode: Mode) -> usize {
    mode.params().band_size * ROW_BYTES
}

fn band_key(hashtable: u32, value: &[u8], sha: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + value.len() + sha.len());
    key.extend_from_slice(&hashtable.to_be_bytes());
    key.extend_from_slice(value);
    key.extend_from_slice(sha.as_bytes());
    key
}

fn split_band_key(mode: Mode, key: &[u8]) -> Result<(u32, usize, usize), StoreError> {
    let width = band_width(mode);
    if key.len() < 4 + width {
        return Err(StoreError::Corrupt(format!(
            "band key of {} bytes, expected at least {}",
            key.len(),
            4 + width
        )));
    }
    let ht = u32::from_be_bytes(key[..4].try_into().expect("4-byte prefix"));
    Ok((ht, 4, 4 + width))
}

/// Persistent backend over a single redb database file.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database and make sure all tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::unavailable)?;

        let txn = db.begin_write().map_err(StoreError::unavailable)?;
        {
            txn.open_table(HASHTABLES_FILE)
                .map_err(StoreError::unavailable)?;
            txn.open_table(HASHTABLES_FUNC)
                .map_err(StoreError::unavailable)?;
            txn.open_table(META).map_err(StoreError::unavailable)?;
            txn.open_table(FEATURES_DOCS)
                .map_err(StoreError::unavailable)?;
            txn.open_table(FEATURES_FREQ)
                .map_err(StoreError::unavailable)?;
        }
        txn.commit().map_err(StoreError::unavailable)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn decode_meta(bytes: &[u8]) -> Result<Vec<RepoFile>, StoreError> {
        let (rows, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(rows)
    }

    fn encode_meta(rows: &[RepoFile]) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(rows, bincode::config::standard())
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

impl StoreBackend for RedbBackend {
    fn upsert_bands(&self, mode: Mode, sha: &str, bands: &[Vec<u8>]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut table = txn
                .open_table(bands_table(mode))
                .map_err(StoreError::unavailable)?;
            for (h, band) in bands.iter().enumerate() {
                let key = band_key(h as u32, band, sha);
                table
                    .insert(key.as_slice(), ())
                    .map_err(StoreError::unavailable)?;
            }
        }
        txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn lookup(
        &self,
        mode: Mode,
        hashtable: u32,
        value: &[u8],
        visit: &mut dyn FnMut(&str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = txn
            .open_table(bands_table(mode))
            .map_err(StoreError::unavailable)?;

        let prefix = band_key(hashtable, value, "");
        for item in table
            .range(prefix.as_slice()..)
            .map_err(StoreError::unavailable)?
        {
            let (key, _) = item.map_err(StoreError::unavailable)?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            let sha = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            visit(sha)?;
        }
        Ok(())
    }

    fn scan_bands(
        &self,
        mode: Mode,
        visit: &mut dyn FnMut(u32, &[u8], &str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::interrupted)?;
        let table = txn
            .open_table(bands_table(mode))
            .map_err(StoreError::interrupted)?;

        for item in table.iter().map_err(StoreError::interrupted)? {
            let (key, _) = item.map_err(StoreError::interrupted)?;
            let key = key.value();
            let (ht, value_start, sha_start) = split_band_key(mode, key)?;
            let sha = std::str::from_utf8(&key[sha_start..])
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            visit(ht, &key[value_start..sha_start], sha)?;
        }
        Ok(())
    }

    fn insert_meta(&self, file: &RepoFile) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut table = txn.open_table(META).map_err(StoreError::unavailable)?;
            let mut rows = match table.get(file.sha.as_str()).map_err(StoreError::unavailable)? {
                Some(bytes) => Self::decode_meta(bytes.value())?,
                None => Vec::new(),
            };
            if !rows.iter().any(|f| f == file) {
                rows.push(file.clone());
                let bytes = Self::encode_meta(&rows)?;
                table
                    .insert(file.sha.as_str(), bytes.as_slice())
                    .map_err(StoreError::unavailable)?;
            }
        }
        txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = txn.open_table(META).map_err(StoreError::unavailable)?;
        match table.get(sha).map_err(StoreError::unavailable)? {
            Some(bytes) => Self::decode_meta(bytes.value()),
            None => Ok(Vec::new()),
        }
    }

    fn scan_meta(
        &self,
        visit: &mut dyn FnMut(&RepoFile) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::interrupted)?;
        let table = txn.open_table(META).map_err(StoreError::interrupted)?;
        for item in table.iter().map_err(StoreError::interrupted)? {
            let (_, bytes) = item.map_err(StoreError::interrupted)?;
            for row in Self::decode_meta(bytes.value())? {
                visit(&row)?;
            }
        }
        Ok(())
    }

    fn put_docfreq(&self, mode: Mode, docs: u64, df: &[(String, u64)]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut docs_table = txn
                .open_table(FEATURES_DOCS)
                .map_err(StoreError::unavailable)?;
            docs_table
                .insert(mode.as_str(), docs)
                .map_err(StoreError::unavailable)?;

            let mut freq_table = txn
                .open_table(FEATURES_FREQ)
                .map_err(StoreError::unavailable)?;
            for (feature, weight) in df {
                freq_table
                    .insert((mode.as_str(), feature.as_str()), *weight as u32)
                    .map_err(StoreError::unavailable)?;
            }
        }
        txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn get_docfreq(&self, mode: Mode) -> Result<Option<(u64, Vec<(String, u64)>)>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let docs_table = txn
            .open_table(FEATURES_DOCS)
            .map_err(StoreError::unavailable)?;
        let docs = match docs_table
            .get(mode.as_str())
            .map_err(StoreError::unavailable)?
        {
            Some(v) => v.value(),
            None => return Ok(None),
        };

        let freq_table = txn
            .open_table(FEATURES_FREQ)
            .map_err(StoreError::unavailable)?;
        let mut df = Vec::new();
        for item in freq_table
            .range((mode.as_str(), "")..)
            .map_err(StoreError::unavailable)?
        {
            let (key, weight) = item.map_err(StoreError::unavailable)?;
            let (id, feature) = key.value();
            if id != mode.as_str() {
                break;
            }
            df.push((feature.to_string(), weight.value() as u64));
        }
        Ok(Some((docs, df)))
    }

    fn drop_hashtables(&self, mode: Mode) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        txn.delete_table(bands_table(mode))
            .map_err(StoreError::unavailable)?;
        txn.open_table(bands_table(mode))
            .map_err(StoreError::unavailable)?;
        txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }
}
