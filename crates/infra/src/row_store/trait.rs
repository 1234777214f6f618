use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use forgeorm_core::OrmError;

/// Address of a stored row: entity class + serialized primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub entity: String,
    pub primary_key: String,
}

impl RowKey {
    pub fn new(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            primary_key: primary_key.into(),
        }
    }
}

impl core::fmt::Display for RowKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}({})", self.entity, self.primary_key)
    }
}

/// Row store operation error.
///
/// These are storage errors; the unit of work converts them into `OrmError`
/// before they reach a reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowStoreError {
    #[error("row {0} is locked by another transaction")]
    Locked(RowKey),

    #[error("row {0} is not locked")]
    NotLocked(RowKey),

    #[error("{0} lock poisoned")]
    Poisoned(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RowStoreError> for OrmError {
    fn from(value: RowStoreError) -> Self {
        match value {
            RowStoreError::Locked(key) => OrmError::lock_wait_timeout(key.to_string()),
            RowStoreError::Poisoned(what) => OrmError::poisoned(what),
            other => OrmError::fetch(other.to_string()),
        }
    }
}

/// Keyed row storage backing the unit of work.
///
/// Rows are plain JSON objects. Locks model pessimistic row locks held by
/// some other transaction; they only affect pessimistic reads.
pub trait RowStore: Send + Sync {
    /// Insert or replace a row.
    fn put(&self, key: RowKey, row: JsonValue) -> Result<(), RowStoreError>;

    fn get(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError>;

    fn remove(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError>;

    /// Lock a row; fails with `Locked` if it already is.
    fn lock_row(&self, key: &RowKey) -> Result<(), RowStoreError>;

    fn unlock_row(&self, key: &RowKey) -> Result<(), RowStoreError>;

    fn is_locked(&self, key: &RowKey) -> Result<bool, RowStoreError>;
}

impl<S> RowStore for Arc<S>
where
    S: RowStore + ?Sized,
{
    fn put(&self, key: RowKey, row: JsonValue) -> Result<(), RowStoreError> {
        (**self).put(key, row)
    }

    fn get(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError> {
        (**self).get(key)
    }

    fn remove(&self, key: &RowKey) -> Result<Option<JsonValue>, RowStoreError> {
        (**self).remove(key)
    }

    fn lock_row(&self, key: &RowKey) -> Result<(), RowStoreError> {
        (**self).lock_row(key)
    }

    fn unlock_row(&self, key: &RowKey) -> Result<(), RowStoreError> {
        (**self).unlock_row(key)
    }

    fn is_locked(&self, key: &RowKey) -> Result<bool, RowStoreError> {
        (**self).is_locked(key)
    }
}
