//! In-memory unit of work.
//!
//! Implements the collaborators the reference layer consumes:
//! - [`EntityFactory`]: skeletal handles from bare identifiers, deduplicated
//!   through the identity map
//! - [`EntityInitializer`]: materializes handles from the row store
//!
//! Every handle it creates is attached to it, so references to those handles
//! can be loaded.

pub mod identity_map;

use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace, warn};

use forgeorm_core::{
    ConnectionType, Entity, LoadOptions, LockMode, OrmError, OrmResult, PrimaryKey,
    ReferenceOptions,
};
use forgeorm_reference::{
    EntityComparator, EntityFactory, EntityHandle, EntityInitializer, SnapshotComparator,
};

use crate::config::UnitOfWorkConfig;
use crate::row_store::{RowKey, RowStore, RowStoreError};

pub use identity_map::{IdentityKey, IdentityMap};

/// Unit-of-work runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitOfWorkStats {
    /// Initializer invocations, successful or not.
    pub init_calls: u64,
    pub read_fetches: u64,
    pub write_fetches: u64,
    /// Skeletal handles minted by `create_reference`.
    pub references_created: u64,
    pub identity_map_hits: u64,
    pub last_load: Option<LoadOptions>,
}

/// Unit of work over a [`RowStore`].
pub struct InMemoryUnitOfWork<S: RowStore> {
    config: UnitOfWorkConfig,
    store: S,
    identity_map: IdentityMap,
    comparator: SnapshotComparator,
    stats: Mutex<UnitOfWorkStats>,
    this: Weak<Self>,
}

impl<S: RowStore + 'static> InMemoryUnitOfWork<S> {
    pub fn new(store: S, config: UnitOfWorkConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            store,
            identity_map: IdentityMap::new(),
            comparator: SnapshotComparator,
            stats: Mutex::new(UnitOfWorkStats::default()),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.identity_map
    }

    pub fn stats(&self) -> UnitOfWorkStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update_stats(&self, f: impl FnOnce(&mut UnitOfWorkStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Make `handle` loadable through this unit of work.
    ///
    /// The handle only holds a weak pointer back; once the unit of work is
    /// dropped its handles become unmanaged.
    pub fn attach<T: Entity>(&self, handle: &Arc<EntityHandle<T>>) {
        handle.set_initializer(self.this.clone());
    }

    /// Write the entity's row without making it resident.
    pub fn insert_row<T: Entity>(&self, entity: &T) -> OrmResult<RowKey> {
        let class = &T::meta().class_name;
        let pk = entity
            .serialized_primary_key()
            .ok_or_else(|| OrmError::malformed_identifier(class, "entity has no primary key"))?;

        let key = RowKey::new(class, pk);
        self.store.put(key.clone(), serde_json::to_value(entity)?)?;
        Ok(key)
    }

    /// Write the entity's row and return its managed, initialized handle.
    ///
    /// An entity already resident under the same key is refreshed in place.
    pub fn persist<T: Entity>(&self, entity: T) -> OrmResult<Arc<EntityHandle<T>>> {
        let row_key = self.insert_row(&entity)?;
        let key = IdentityKey::new(row_key.entity, None, row_key.primary_key);

        if self.config.identity_map {
            if let Some(resident) = self.identity_map.get::<T>(&key) {
                resident.hydrate(entity);
                resident.set_original_data(self.comparator.prepare_entity(&*resident));
                return Ok(resident);
            }
        }

        let handle = EntityHandle::with_data(entity);
        self.attach(&handle);
        handle.set_original_data(self.comparator.prepare_entity(&*handle));
        if self.config.identity_map {
            return Ok(self.identity_map.insert(key, handle));
        }
        Ok(handle)
    }

    /// Resident handle for `pk`, if any.
    pub fn get_resident<T: Entity>(
        &self,
        pk: impl Into<PrimaryKey>,
        schema: Option<&str>,
    ) -> OrmResult<Option<Arc<EntityHandle<T>>>> {
        let entity = T::from_primary_key(&pk.into())?;
        let Some(spk) = entity.serialized_primary_key() else {
            return Ok(None);
        };
        let key = IdentityKey::new(&T::meta().class_name, schema.map(str::to_string), spk);
        Ok(self.identity_map.get::<T>(&key))
    }

    /// Drop every resident handle.
    pub fn clear(&self) {
        debug!(
            uow = %self.config.name,
            resident = self.identity_map.len(),
            "clearing identity map"
        );
        self.identity_map.clear();
    }
}

impl<S: RowStore + 'static> EntityFactory for InMemoryUnitOfWork<S> {
    type Comparator = SnapshotComparator;

    fn create_reference<T: Entity>(
        &self,
        pk: PrimaryKey,
        options: &ReferenceOptions,
    ) -> OrmResult<Arc<EntityHandle<T>>> {
        let class = &T::meta().class_name;
        let entity = T::from_primary_key(&pk)?;
        let key = entity
            .serialized_primary_key()
            .map(|spk| IdentityKey::new(class, options.schema.clone(), spk));

        if self.config.identity_map {
            if let Some(resident) = key.as_ref().and_then(|k| self.identity_map.get::<T>(k)) {
                trace!(uow = %self.config.name, entity = %class, pk = %pk, "identity map hit");
                self.update_stats(|s| s.identity_map_hits += 1);
                return Ok(resident);
            }
        }

        let handle = EntityHandle::new(entity);
        self.attach(&handle);
        handle.set_schema(options.schema.clone());
        self.update_stats(|s| s.references_created += 1);
        debug!(
            uow = %self.config.name,
            entity = %class,
            pk = %pk,
            schema = ?options.schema,
            merge = options.merge,
            convert_custom_types = options.convert_custom_types,
            "created skeletal entity"
        );

        match key {
            Some(key) if options.merge && self.config.identity_map => {
                Ok(self.identity_map.insert(key, handle))
            }
            _ => Ok(handle),
        }
    }

    fn comparator(&self) -> &Self::Comparator {
        &self.comparator
    }
}

#[async_trait]
impl<T, S> EntityInitializer<T> for InMemoryUnitOfWork<S>
where
    T: Entity,
    S: RowStore + 'static,
{
    async fn init(&self, handle: Arc<EntityHandle<T>>, options: LoadOptions) -> OrmResult<()> {
        self.update_stats(|s| {
            s.init_calls += 1;
            match options.connection_type {
                Some(ConnectionType::Write) => s.write_fetches += 1,
                Some(ConnectionType::Read) | None => s.read_fetches += 1,
            }
            s.last_load = Some(options.clone());
        });

        // Fetch boundary.
        tokio::task::yield_now().await;

        let class = &T::meta().class_name;
        let pk = handle
            .get_serialized_primary_key()
            .ok_or_else(|| OrmError::malformed_identifier(class, "entity has no primary key"))?;
        let row_key = RowKey::new(class, &pk);

        let pessimistic = options.lock_mode.is_some_and(LockMode::is_pessimistic);
        if pessimistic && self.store.is_locked(&row_key)? {
            warn!(uow = %self.config.name, row = %row_key, "pessimistic load blocked by row lock");
            return Err(RowStoreError::Locked(row_key).into());
        }

        let row = self
            .store
            .get(&row_key)?
            .ok_or_else(|| OrmError::not_found(class, &pk))?;
        handle.hydrate(serde_json::from_value::<T>(row)?);
        handle.set_original_data(self.comparator.prepare_entity(&*handle));
        if !options.populate.is_empty() {
            handle.set_populated(true);
        }

        if self.config.identity_map {
            if let Some(key) = IdentityKey::of(&handle) {
                self.identity_map.insert(key, Arc::clone(&handle));
            }
        }

        debug!(
            uow = %self.config.name,
            entity = %class,
            pk = %pk,
            populate = ?options.populate,
            "entity materialized"
        );
        Ok(())
    }
}
