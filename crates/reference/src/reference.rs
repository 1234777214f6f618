//! Lazy to-one reference.
//!
//! A [`Reference`] wraps exactly one [`EntityHandle`] and exposes its
//! identifier without loading anything. The full entity is only reachable
//! after an explicit [`Reference::load`] (or if it was already initialized).
//!
//! Identifier accessors always read through to the currently wrapped handle,
//! so re-pointing with [`Reference::set`] is immediately visible.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use forgeorm_core::{Entity, EntityMeta, LoadOptions, OrmError, OrmResult, PrimaryKey, Value};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::handle::EntityHandle;

/// Shared state behind every clone of a reference.
pub(crate) struct ReferenceCell<T: Entity> {
    entity: RwLock<Arc<EntityHandle<T>>>,
}

/// Lazy reference to an entity of type `T`.
///
/// Cloning is cheap and yields the same reference: re-pointing one clone
/// re-points all of them.
pub struct Reference<T: Entity> {
    cell: Arc<ReferenceCell<T>>,
}

impl<T: Entity> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Entity> Reference<T> {
    /// Wrap `handle` in a brand-new reference.
    ///
    /// Mirrors `set`: the handle's canonical-reference claim is cleared.
    /// Use [`crate::factory::create`] to obtain the canonical reference instead.
    pub(crate) fn wrap(handle: Arc<EntityHandle<T>>) -> Self {
        handle.clear_reference_marker();
        Self {
            cell: Arc::new(ReferenceCell {
                entity: RwLock::new(handle),
            }),
        }
    }

    pub(crate) fn from_cell(cell: Arc<ReferenceCell<T>>) -> Self {
        Self { cell }
    }

    pub(crate) fn downgrade(&self) -> Weak<ReferenceCell<T>> {
        Arc::downgrade(&self.cell)
    }

    /// True if both values are the same reference (not merely the same entity).
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    pub fn meta(&self) -> &'static EntityMeta {
        T::meta()
    }

    /// The wrapped handle, whatever its initialization state.
    pub fn unwrap(&self) -> Arc<EntityHandle<T>> {
        let entity = self.cell.entity.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*entity)
    }

    /// Re-point this reference at another entity.
    ///
    /// References are unwrapped first, so a reference never wraps another one.
    /// The newly wrapped handle loses any canonical-reference claim it carried.
    /// Nothing is fetched.
    pub fn set(&self, value: impl Into<Related<T>>) {
        let handle = value.into().into_handle();
        debug!(
            entity = %T::meta().class_name,
            pk = %handle.get_serialized_primary_key().unwrap_or_default(),
            "re-pointing reference"
        );

        *self.cell.entity.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&handle);
        handle.clear_reference_marker();
    }

    /// Value of a primary-key field on the wrapped handle.
    ///
    /// Returns `None` for fields that are not declared primary keys.
    pub fn identifier(&self, field: &str) -> Option<Value> {
        if !T::meta().is_primary_key(field) {
            return None;
        }
        self.unwrap().field(field)
    }

    /// All primary-key fields with their current values, in declaration order.
    pub fn identifiers(&self) -> Vec<(&'static str, Value)> {
        let handle = self.unwrap();
        T::meta()
            .primary_keys
            .iter()
            .map(|name| (name.as_str(), handle.field(name).unwrap_or(Value::Null)))
            .collect()
    }

    pub fn primary_key(&self) -> Option<PrimaryKey> {
        self.unwrap().get_primary_key()
    }

    pub fn serialized_primary_key(&self) -> Option<String> {
        self.unwrap().get_serialized_primary_key()
    }

    /// The distinct serialized primary key, only for entities that declare one.
    pub fn serialized_primary_key_field(&self) -> Option<String> {
        T::meta().distinct_serialized_primary_key()?;
        self.serialized_primary_key()
    }

    pub fn is_initialized(&self) -> bool {
        self.unwrap().is_initialized()
    }

    /// Toggle the populated marker on the wrapped handle (defaults to `true`).
    pub fn populated(&self, populated: Option<bool>) {
        self.unwrap().set_populated(populated.unwrap_or(true));
    }

    /// Materialize the entity if needed and return its handle.
    pub async fn load(&self) -> OrmResult<Arc<EntityHandle<T>>> {
        self.load_with(LoadOptions::default()).await
    }

    /// Like [`Reference::load`], forwarding population, lock mode and
    /// connection selection to the initializer.
    pub async fn load_with(&self, options: LoadOptions) -> OrmResult<Arc<EntityHandle<T>>> {
        self.ensure_initialized(options).await?;
        Ok(self.unwrap())
    }

    /// Materialize the entity if needed and return a single field.
    pub async fn load_property(&self, property: &str) -> OrmResult<Option<Value>> {
        self.load_property_with(property, LoadOptions::default()).await
    }

    pub async fn load_property_with(
        &self,
        property: &str,
        options: LoadOptions,
    ) -> OrmResult<Option<Value>> {
        self.ensure_initialized(options).await?;
        Ok(self.unwrap().field(property))
    }

    async fn ensure_initialized(&self, options: LoadOptions) -> OrmResult<()> {
        let handle = self.unwrap();
        if handle.is_initialized() {
            return Ok(());
        }

        debug!(
            entity = %T::meta().class_name,
            pk = %handle.get_serialized_primary_key().unwrap_or_default(),
            populate = ?options.populate,
            lock_mode = ?options.lock_mode,
            connection_type = ?options.connection_type,
            "loading reference"
        );

        handle.init(options).await.inspect_err(|err| {
            warn!(entity = %T::meta().class_name, error = %err, "reference load failed");
        })
    }

    /// The wrapped handle, failing if it has not been materialized.
    pub fn get_entity(&self) -> OrmResult<Arc<EntityHandle<T>>> {
        let handle = self.unwrap();
        if !handle.is_initialized() {
            return Err(OrmError::not_initialized(
                &T::meta().class_name,
                handle.get_serialized_primary_key().unwrap_or_default(),
            ));
        }
        Ok(handle)
    }

    /// A single field of the materialized entity.
    pub fn get_property(&self, property: &str) -> OrmResult<Option<Value>> {
        Ok(self.get_entity()?.field(property))
    }

    /// Serialize exactly as the wrapped handle would.
    pub fn to_json(&self, ignore_fields: &[&str]) -> OrmResult<Value> {
        self.unwrap().to_json(ignore_fields)
    }

    fn label(&self) -> String {
        format!(
            "Ref<{}<{}>>",
            T::meta().class_name,
            self.serialized_primary_key().unwrap_or_default()
        )
    }
}

impl<T: Entity> PartialEq for Reference<T> {
    /// References compare like the entities they wrap.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.unwrap(), &other.unwrap())
    }
}

impl<T: Entity> Eq for Reference<T> {}

impl<T: Entity> PartialEq<Arc<EntityHandle<T>>> for Reference<T> {
    fn eq(&self, other: &Arc<EntityHandle<T>>) -> bool {
        Arc::ptr_eq(&self.unwrap(), other)
    }
}

impl<T: Entity> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.unwrap().read().serialize(serializer)
    }
}

impl<T: Entity> core::fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label())
    }
}

impl<T: Entity> core::fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = self.label();
        let handle = self.unwrap();
        let entity = handle.read();
        if f.alternate() {
            write!(f, "{label} {:#?}", *entity)
        } else {
            write!(f, "{label} {:?}", *entity)
        }
    }
}

/// A to-one relation value: either a raw handle or a reference to one.
pub enum Related<T: Entity> {
    Entity(Arc<EntityHandle<T>>),
    Reference(Reference<T>),
}

impl<T: Entity> Related<T> {
    pub fn is_reference(&self) -> bool {
        matches!(self, Related::Reference(_))
    }

    /// The underlying handle, stripping any reference wrapper.
    pub fn into_handle(self) -> Arc<EntityHandle<T>> {
        match self {
            Related::Entity(handle) => handle,
            Related::Reference(reference) => reference.unwrap(),
        }
    }

    pub fn handle(&self) -> Arc<EntityHandle<T>> {
        match self {
            Related::Entity(handle) => Arc::clone(handle),
            Related::Reference(reference) => reference.unwrap(),
        }
    }

    pub fn as_reference(&self) -> Option<&Reference<T>> {
        match self {
            Related::Reference(reference) => Some(reference),
            Related::Entity(_) => None,
        }
    }
}

impl<T: Entity> Clone for Related<T> {
    fn clone(&self) -> Self {
        match self {
            Related::Entity(handle) => Related::Entity(Arc::clone(handle)),
            Related::Reference(reference) => Related::Reference(reference.clone()),
        }
    }
}

impl<T: Entity> From<Arc<EntityHandle<T>>> for Related<T> {
    fn from(value: Arc<EntityHandle<T>>) -> Self {
        Related::Entity(value)
    }
}

impl<T: Entity> From<&Arc<EntityHandle<T>>> for Related<T> {
    fn from(value: &Arc<EntityHandle<T>>) -> Self {
        Related::Entity(Arc::clone(value))
    }
}

impl<T: Entity> From<Reference<T>> for Related<T> {
    fn from(value: Reference<T>) -> Self {
        Related::Reference(value)
    }
}

impl<T: Entity> From<&Reference<T>> for Related<T> {
    fn from(value: &Reference<T>) -> Self {
        Related::Reference(value.clone())
    }
}

impl<T: Entity> PartialEq for Related<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handle(), &other.handle())
    }
}

impl<T: Entity> Serialize for Related<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.handle().read().serialize(serializer)
    }
}

impl<T: Entity> core::fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Related::Entity(handle) => core::fmt::Debug::fmt(&**handle, f),
            Related::Reference(reference) => core::fmt::Debug::fmt(reference, f),
        }
    }
}
