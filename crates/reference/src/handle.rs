//! Entity handle: a shared entity instance plus its tracking state.

use std::collections::BTreeSet;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use forgeorm_core::{
    Entity, EntityData, EntityMeta, LoadOptions, OrmError, OrmResult, PrimaryKey, Value,
};
use tracing::trace;

use crate::collaborators::EntityInitializer;
use crate::reference::{Reference, ReferenceCell};

/// Mutable tracking state attached to every handle.
struct HelperState<T: Entity> {
    initialized: bool,
    populated: bool,
    loaded_properties: BTreeSet<String>,
    original_data: Option<EntityData>,
    /// Unit of work managing this handle. Held weakly: the unit of work owns
    /// its handles, not the other way round.
    initializer: Option<Weak<dyn EntityInitializer<T>>>,
    /// Schema the handle was created under, if any.
    schema: Option<String>,
    /// Canonical reference for this handle, if one currently claims it.
    reference: Option<Weak<ReferenceCell<T>>>,
}

impl<T: Entity> Default for HelperState<T> {
    fn default() -> Self {
        Self {
            initialized: false,
            populated: false,
            loaded_properties: BTreeSet::new(),
            original_data: None,
            initializer: None,
            schema: None,
            reference: None,
        }
    }
}

/// A persisted entity instance shared across the object graph.
///
/// Handles are always used behind an `Arc`; two handles are "the same entity"
/// only if they are the same allocation (`Arc::ptr_eq`).
pub struct EntityHandle<T: Entity> {
    data: RwLock<T>,
    helper: Mutex<HelperState<T>>,
}

impl<T: Entity> EntityHandle<T> {
    /// Wrap an entity that has not been materialized yet.
    pub fn new(entity: T) -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(entity),
            helper: Mutex::new(HelperState::default()),
        })
    }

    /// Wrap a fully loaded entity (every declared property marked loaded).
    pub fn with_data(entity: T) -> Arc<Self> {
        let handle = Self::new(entity);
        {
            let mut helper = handle.helper();
            helper.initialized = true;
            helper.loaded_properties = all_properties::<T>();
        }
        handle
    }

    fn helper(&self) -> MutexGuard<'_, HelperState<T>> {
        self.helper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn meta(&self) -> &'static EntityMeta {
        T::meta()
    }

    /// Read access to the entity fields.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access to the entity fields.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.read().field(name)
    }

    pub fn get_primary_key(&self) -> Option<PrimaryKey> {
        self.read().primary_key()
    }

    pub fn get_serialized_primary_key(&self) -> Option<String> {
        self.read().serialized_primary_key()
    }

    pub fn has_primary_key(&self) -> bool {
        self.get_primary_key().is_some_and(|pk| pk.is_complete())
    }

    pub fn is_initialized(&self) -> bool {
        self.helper().initialized
    }

    /// Set by initializers once materialization finished.
    pub fn set_initialized(&self, initialized: bool) {
        self.helper().initialized = initialized;
    }

    pub fn is_populated(&self) -> bool {
        self.helper().populated
    }

    pub fn set_populated(&self, populated: bool) {
        self.helper().populated = populated;
    }

    pub fn loaded_properties(&self) -> BTreeSet<String> {
        self.helper().loaded_properties.clone()
    }

    pub fn is_loaded(&self, property: &str) -> bool {
        self.helper().loaded_properties.contains(property)
    }

    pub fn mark_loaded(&self, property: impl Into<String>) {
        self.helper().loaded_properties.insert(property.into());
    }

    pub fn original_data(&self) -> Option<EntityData> {
        self.helper().original_data.clone()
    }

    pub fn set_original_data(&self, data: EntityData) {
        self.helper().original_data = Some(data);
    }

    /// The attached unit of work, if it is still alive.
    pub fn initializer(&self) -> Option<Arc<dyn EntityInitializer<T>>> {
        self.helper().initializer.as_ref()?.upgrade()
    }

    /// Attach the unit of work responsible for loading this handle.
    pub fn set_initializer(&self, initializer: Weak<dyn EntityInitializer<T>>) {
        self.helper().initializer = Some(initializer);
    }

    /// True while an attached unit of work is alive.
    pub fn is_managed(&self) -> bool {
        self.initializer().is_some()
    }

    pub fn schema(&self) -> Option<String> {
        self.helper().schema.clone()
    }

    pub fn set_schema(&self, schema: Option<String>) {
        self.helper().schema = schema;
    }

    /// Replace the entity fields with freshly fetched data and mark the
    /// handle initialized.
    pub fn hydrate(&self, entity: T) {
        *self.write() = entity;
        let mut helper = self.helper();
        helper.loaded_properties = all_properties::<T>();
        helper.initialized = true;
    }

    /// Materialize the handle through its initializer.
    ///
    /// Fails with `NotManaged` if no unit of work is attached or it has been
    /// dropped. Otherwise the initializer's result is returned untouched.
    pub async fn init(self: &Arc<Self>, options: LoadOptions) -> OrmResult<()> {
        let initializer = self.initializer().ok_or_else(|| {
            OrmError::not_managed(
                &T::meta().class_name,
                self.get_serialized_primary_key().unwrap_or_default(),
            )
        })?;

        initializer.init(Arc::clone(self), options).await
    }

    /// Serialize the entity, dropping `ignore_fields` from the top-level object.
    pub fn to_json(&self, ignore_fields: &[&str]) -> OrmResult<Value> {
        let mut value = serde_json::to_value(&*self.read())?;
        if let Value::Object(map) = &mut value {
            for field in ignore_fields {
                map.remove(*field);
            }
        }
        Ok(value)
    }

    /// Canonical reference for this handle, creating one if none is alive.
    pub fn to_reference(self: &Arc<Self>) -> Reference<T> {
        if let Some(existing) = self.canonical_reference() {
            trace!(entity = %T::meta().class_name, "reusing canonical reference");
            return existing;
        }

        let reference = Reference::wrap(Arc::clone(self));
        self.claim_reference(&reference);
        reference
    }

    /// True if a live reference currently claims this handle as its payload.
    pub fn has_reference_marker(&self) -> bool {
        self.canonical_reference().is_some()
    }

    /// Forget the canonical reference claim, if any.
    pub fn clear_reference_marker(&self) {
        self.helper().reference = None;
    }

    pub(crate) fn claim_reference(&self, reference: &Reference<T>) {
        self.helper().reference = Some(reference.downgrade());
    }

    fn canonical_reference(&self) -> Option<Reference<T>> {
        let weak = self.helper().reference.clone()?;
        weak.upgrade().map(Reference::from_cell)
    }
}

fn all_properties<T: Entity>() -> BTreeSet<String> {
    let meta = T::meta();
    meta.primary_keys
        .iter()
        .cloned()
        .chain(meta.properties.iter().map(|p| p.name.clone()))
        .collect()
}

impl<T: Entity> core::fmt::Debug for EntityHandle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&*self.read(), f)
    }
}
