//! Identity map: at most one resident handle per (entity, schema, key).

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use forgeorm_core::Entity;
use forgeorm_reference::EntityHandle;

/// Identity of a resident entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub entity: String,
    pub schema: Option<String>,
    pub primary_key: String,
}

impl IdentityKey {
    pub fn new(
        entity: impl Into<String>,
        schema: Option<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            schema,
            primary_key: primary_key.into(),
        }
    }

    /// Key of a handle under the schema it was created with, if its primary
    /// key is set.
    pub fn of<T: Entity>(handle: &EntityHandle<T>) -> Option<Self> {
        let pk = handle.get_serialized_primary_key()?;
        Some(Self::new(&T::meta().class_name, handle.schema(), pk))
    }
}

/// Type-erased map of resident handles.
#[derive(Default)]
pub struct IdentityMap {
    entries: RwLock<HashMap<IdentityKey, Arc<dyn Any + Send + Sync>>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Entity>(&self, key: &IdentityKey) -> Option<Arc<EntityHandle<T>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = Arc::clone(entries.get(key)?);
        entry.downcast::<EntityHandle<T>>().ok()
    }

    /// Register a handle, keeping any handle already resident under `key`.
    ///
    /// Returns the resident handle.
    pub fn insert<T: Entity>(
        &self,
        key: IdentityKey,
        handle: Arc<EntityHandle<T>>,
    ) -> Arc<EntityHandle<T>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(key)
            .or_insert_with(|| handle.clone() as Arc<dyn Any + Send + Sync>);

        Arc::clone(entry)
            .downcast::<EntityHandle<T>>()
            .unwrap_or(handle)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    pub fn remove(&self, key: &IdentityKey) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl core::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("IdentityMap")
            .field("keys", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
