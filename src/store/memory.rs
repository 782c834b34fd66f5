//! `memory` store: ephemeral in-process partition store.
//!
//! All rows live in a mutex-guarded ordered map and are discarded when the
//! process exits.  Used by tests and by the `memory` backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::AppError;
use super::{PartitionStore, Row, check_version};

/// (pk, sk) -> row
type RowMap = BTreeMap<(String, String), Row>;

pub struct MemoryStore {
    rows: Mutex<RowMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { rows: Mutex::new(BTreeMap::new()) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RowMap>, AppError> {
        self.rows
            .lock()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    /// Number of stored rows across all partitions.
    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionStore for MemoryStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    fn get(&self, pk: &str, sk: &str) -> Result<Option<Row>, AppError> {
        let rows = self.lock()?;
        Ok(rows.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Row>, AppError> {
        let rows = self.lock()?;
        Ok(rows
            .range((pk.to_string(), sk_prefix.to_string())..)
            .take_while(|((p, s), _)| p == pk && s.starts_with(sk_prefix))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn put(&self, row: Row) -> Result<(), AppError> {
        let mut rows = self.lock()?;
        rows.insert((row.pk.clone(), row.sk.clone()), row);
        Ok(())
    }

    fn put_versioned(&self, row: Row, expected: Option<i64>) -> Result<(), AppError> {
        let mut rows = self.lock()?;
        let key = (row.pk.clone(), row.sk.clone());
        check_version(row.key(), rows.get(&key), expected)?;
        rows.insert(key, row);
        Ok(())
    }
}
