use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use super::r#trait::{RowKey, RowStore, RowStoreError};

/// In-memory row store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    rows: RwLock<HashMap<RowKey, JsonValue>>,
    locks: RwLock<HashSet<RowKey>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(what: &str) -> RowStoreError {
    RowStoreError::Poisoned(what.to_string())
}

impl RowStore for InMemoryRowStore {
    fn put(&self, key: RowKey, row: JsonValue) -> Result<(), RowStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned("rows"))?;
        rows.insert(key, row);
        Ok(())
    }

    fn get(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError> {
        let rows = self.rows.read().map_err(|_| poisoned("rows"))?;
        Ok(rows.get(key).cloned())
    }

    fn remove(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned("rows"))?;
        Ok(rows.remove(key))
    }

    fn lock_row(&self, key: &RowKey) -> Result<(), RowStoreError> {
        let mut locks = self.locks.write().map_err(|_| poisoned("row locks"))?;
        if !locks.insert(key.clone()) {
            return Err(RowStoreError::Locked(key.clone()));
        }
        Ok(())
    }

    fn unlock_row(&self, key: &RowKey) -> Result<(), RowStoreError> {
        let mut locks = self.locks.write().map_err(|_| poisoned("row locks"))?;
        if !locks.remove(key) {
            return Err(RowStoreError::NotLocked(key.clone()));
        }
        Ok(())
    }

    fn is_locked(&self, key: &RowKey) -> Result<bool, RowStoreError> {
        let locks = self.locks.read().map_err(|_| poisoned("row locks"))?;
        Ok(locks.contains(key))
    }
}
