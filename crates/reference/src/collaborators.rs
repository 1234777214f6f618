//! Contracts the reference layer consumes from the unit of work.
//!
//! The reference layer never fetches anything itself. It asks an
//! [`EntityInitializer`] to materialize a handle and an [`EntityFactory`] to
//! build skeletal handles from bare identifiers.

use std::sync::Arc;

use async_trait::async_trait;
use forgeorm_core::{Entity, EntityData, LoadOptions, OrmResult, PrimaryKey, ReferenceOptions};

use crate::handle::EntityHandle;

/// Materializes entity handles.
///
/// Implementations are expected to mark the handle initialized on success
/// (typically via [`EntityHandle::hydrate`]). Concurrent calls for the same
/// handle are not deduplicated by the caller.
#[async_trait]
pub trait EntityInitializer<T: Entity>: Send + Sync {
    async fn init(&self, handle: Arc<EntityHandle<T>>, options: LoadOptions) -> OrmResult<()>;
}

#[async_trait]
impl<T, I> EntityInitializer<T> for Arc<I>
where
    T: Entity,
    I: EntityInitializer<T> + ?Sized,
{
    async fn init(&self, handle: Arc<EntityHandle<T>>, options: LoadOptions) -> OrmResult<()> {
        (**self).init(handle, options).await
    }
}

/// Captures the baseline used for later change detection.
pub trait EntityComparator: Send + Sync {
    fn prepare_entity<T: Entity>(&self, handle: &EntityHandle<T>) -> EntityData;
}

/// Default comparator: snapshots the values of loaded properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotComparator;

impl EntityComparator for SnapshotComparator {
    fn prepare_entity<T: Entity>(&self, handle: &EntityHandle<T>) -> EntityData {
        let entity = handle.read();
        handle
            .loaded_properties()
            .into_iter()
            .filter_map(|name| entity.field(&name).map(|value| (name, value)))
            .collect()
    }
}

/// Builds skeletal (uninitialized) handles from bare identifiers.
pub trait EntityFactory: Send + Sync {
    type Comparator: EntityComparator;

    /// Produce a handle whose identifier fields are set and nothing else is
    /// loaded. No fetch is performed.
    fn create_reference<T: Entity>(
        &self,
        pk: PrimaryKey,
        options: &ReferenceOptions,
    ) -> OrmResult<Arc<EntityHandle<T>>>;

    fn comparator(&self) -> &Self::Comparator;
}

impl<F> EntityFactory for Arc<F>
where
    F: EntityFactory + ?Sized,
{
    type Comparator = F::Comparator;

    fn create_reference<T: Entity>(
        &self,
        pk: PrimaryKey,
        options: &ReferenceOptions,
    ) -> OrmResult<Arc<EntityHandle<T>>> {
        (**self).create_reference(pk, options)
    }

    fn comparator(&self) -> &Self::Comparator {
        (**self).comparator()
    }
}
