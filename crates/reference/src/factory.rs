//! Factory functions producing references.
//!
//! - [`create`] wraps an entity that is already resident.
//! - [`create_from_pk`] / [`create_naked_from_pk`] mint a skeletal entity from
//!   a bare identifier (no fetch) through an [`EntityFactory`].
//! - [`reference`] / [`rel`] dispatch between the two on a [`RefSource`].
//!
//! Identifiers are not validated here; whatever the entity factory rejects
//! is returned to the caller unchanged.

use std::sync::Arc;

use forgeorm_core::{Entity, OrmResult, PrimaryKey, PropertyMeta, ReferenceOptions};
use tracing::debug;

use crate::collaborators::{EntityComparator, EntityFactory};
use crate::handle::EntityHandle;
use crate::reference::{Reference, Related};

/// Input of [`reference`] and [`rel`]: an existing entity or a bare identifier.
pub enum RefSource<T: Entity> {
    Handle(Related<T>),
    Identifier(PrimaryKey, ReferenceOptions),
}

impl<T: Entity> RefSource<T> {
    pub fn identifier(pk: impl Into<PrimaryKey>) -> Self {
        RefSource::Identifier(pk.into(), ReferenceOptions::default())
    }
}

impl<T: Entity> From<Arc<EntityHandle<T>>> for RefSource<T> {
    fn from(value: Arc<EntityHandle<T>>) -> Self {
        RefSource::Handle(value.into())
    }
}

impl<T: Entity> From<Reference<T>> for RefSource<T> {
    fn from(value: Reference<T>) -> Self {
        RefSource::Handle(value.into())
    }
}

/// Canonical reference for an entity (or for the entity behind a reference).
///
/// If the handle's canonical reference currently points elsewhere it is
/// re-pointed back to the handle and re-claimed, so `create` on the same
/// handle keeps returning the same reference.
pub fn create<T: Entity>(value: impl Into<Related<T>>) -> Reference<T> {
    let handle = unwrap_reference(value);
    let reference = handle.to_reference();

    if !Arc::ptr_eq(&reference.unwrap(), &handle) {
        reference.set(&handle);
        handle.claim_reference(&reference);
    }

    reference
}

/// Reference to a skeletal entity built from `pk`. Nothing is fetched.
pub fn create_from_pk<T, F>(
    factory: &F,
    pk: impl Into<PrimaryKey>,
    options: ReferenceOptions,
) -> OrmResult<Reference<T>>
where
    T: Entity,
    F: EntityFactory + ?Sized,
{
    let handle = create_naked_from_pk(factory, pk, options)?;
    Ok(create(handle))
}

/// Skeletal entity built from `pk`, without a reference wrapper.
///
/// Primary-key fields are marked loaded and the current field values are
/// snapshotted for change detection.
pub fn create_naked_from_pk<T, F>(
    factory: &F,
    pk: impl Into<PrimaryKey>,
    options: ReferenceOptions,
) -> OrmResult<Arc<EntityHandle<T>>>
where
    T: Entity,
    F: EntityFactory + ?Sized,
{
    let pk = pk.into();
    debug!(
        entity = %T::meta().class_name,
        pk = %pk,
        merge = options.merge,
        schema = ?options.schema,
        "creating entity from primary key"
    );

    let handle = factory.create_reference::<T>(pk, &options)?;
    for key in &T::meta().primary_keys {
        handle.mark_loaded(key.clone());
    }
    handle.set_original_data(factory.comparator().prepare_entity(&*handle));

    Ok(handle)
}

pub fn is_reference<T: Entity>(value: &Related<T>) -> bool {
    value.is_reference()
}

/// Wrap `value` in its canonical reference if `property` is declared as a
/// wrapped reference; otherwise return it unchanged.
pub fn wrap_reference<T: Entity>(
    value: Option<Related<T>>,
    property: &PropertyMeta,
) -> Option<Related<T>> {
    match value {
        Some(value) if property.wrapped_reference && !value.is_reference() => {
            Some(Related::Reference(create(value)))
        }
        other => other,
    }
}

/// The underlying handle of a relation value.
pub fn unwrap_reference<T: Entity>(value: impl Into<Related<T>>) -> Arc<EntityHandle<T>> {
    value.into().into_handle()
}

/// Reference from either an existing entity or a bare identifier.
pub fn reference<T, F>(factory: &F, source: RefSource<T>) -> OrmResult<Reference<T>>
where
    T: Entity,
    F: EntityFactory + ?Sized,
{
    match source {
        RefSource::Handle(value) => Ok(create(value)),
        RefSource::Identifier(pk, options) => create_from_pk(factory, pk, options),
    }
}

/// Raw entity from either an existing entity or a bare identifier.
///
/// Useful for assigning relations without a reference layer.
pub fn rel<T, F>(factory: &F, source: RefSource<T>) -> OrmResult<Arc<EntityHandle<T>>>
where
    T: Entity,
    F: EntityFactory + ?Sized,
{
    match source {
        RefSource::Handle(value) => Ok(unwrap_reference(value)),
        RefSource::Identifier(pk, options) => create_naked_from_pk(factory, pk, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Author, TestFactory};
    use forgeorm_core::OrmError;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn create_preserves_identity() {
        let handle = EntityHandle::new(Author::with_id(1));
        let reference = create(&handle);
        assert!(Arc::ptr_eq(&unwrap_reference(&reference), &handle));
        assert!(Arc::ptr_eq(&reference.unwrap(), &handle));
    }

    #[test]
    fn create_returns_the_canonical_reference() {
        let handle = EntityHandle::new(Author::with_id(1));
        let a = create(&handle);
        let b = create(&handle);
        let c = create(&a);
        assert!(Reference::ptr_eq(&a, &b));
        assert!(Reference::ptr_eq(&a, &c));
    }

    #[test]
    fn create_repoints_a_canonical_reference_that_wandered_off() {
        let a = EntityHandle::new(Author::with_id(1));
        let b = EntityHandle::new(Author::with_id(2));
        let reference = create(&a);
        reference.set(&b);

        let again = create(&a);
        assert!(Reference::ptr_eq(&reference, &again));
        assert!(Arc::ptr_eq(&again.unwrap(), &a));
        assert!(a.has_reference_marker());
        assert_eq!(create(&a).identifier("id"), Some(json!(1)));
    }

    #[test]
    fn create_from_pk_builds_skeletal_entity() {
        let factory = TestFactory::new();
        let reference: Reference<Author> =
            create_from_pk(&factory, 7, ReferenceOptions::default()).unwrap();

        assert_eq!(reference.identifier("id"), Some(json!(7)));
        assert!(!reference.is_initialized());

        let handle = reference.unwrap();
        assert!(handle.is_loaded("id"));
        assert!(!handle.is_loaded("name"));
        let snapshot = handle.original_data().unwrap();
        assert_eq!(snapshot.get("id"), Some(&json!(7)));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn create_from_pk_forwards_options() {
        let factory = TestFactory::new();
        let options = ReferenceOptions::new().with_schema("archive").with_merge(true);
        let _: Reference<Author> = create_from_pk(&factory, 7, options.clone()).unwrap();
        assert_eq!(factory.last_options(), Some(options));
    }

    #[test]
    fn create_naked_from_pk_returns_raw_handle() {
        let factory = TestFactory::new();
        let handle: Arc<EntityHandle<Author>> =
            create_naked_from_pk(&factory, 3, ReferenceOptions::default()).unwrap();
        assert!(!handle.has_reference_marker());
        assert!(!handle.is_initialized());
        assert_eq!(handle.get_primary_key(), Some(PrimaryKey::from(3)));
    }

    #[test]
    fn malformed_identifiers_propagate() {
        let factory = TestFactory::new();
        let err = create_from_pk::<Author, _>(&factory, "seven", ReferenceOptions::default())
            .unwrap_err();
        assert!(matches!(err, OrmError::MalformedIdentifier { .. }));
    }

    #[test]
    fn wrap_reference_respects_property_metadata() {
        let handle = EntityHandle::new(Author::with_id(1));
        let wrapped = PropertyMeta::many_to_one("author", "Author").wrapped();
        let plain = PropertyMeta::many_to_one("author", "Author");

        let value = wrap_reference(Some(Related::from(&handle)), &wrapped).unwrap();
        assert!(is_reference(&value));

        let value = wrap_reference(Some(Related::from(&handle)), &plain).unwrap();
        assert!(!is_reference(&value));

        assert!(wrap_reference::<Author>(None, &wrapped).is_none());
    }

    #[test]
    fn wrap_reference_keeps_existing_references() {
        let other = EntityHandle::new(Author::with_id(2));
        let existing = Reference::wrap(Arc::clone(&other));
        let wrapped = PropertyMeta::many_to_one("author", "Author").wrapped();

        let value = wrap_reference(Some(Related::from(&existing)), &wrapped).unwrap();
        assert!(Reference::ptr_eq(value.as_reference().unwrap(), &existing));
    }

    #[test]
    fn reference_dispatches_on_source() {
        let factory = TestFactory::new();
        let handle = EntityHandle::new(Author::with_id(1));

        let by_handle = reference(&factory, RefSource::from(Arc::clone(&handle))).unwrap();
        assert!(Arc::ptr_eq(&by_handle.unwrap(), &handle));

        let by_id = reference::<Author, _>(&factory, RefSource::identifier(2)).unwrap();
        assert_eq!(by_id.identifier("id"), Some(json!(2)));
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn rel_returns_unwrapped_values() {
        let factory = TestFactory::new();
        let handle = EntityHandle::new(Author::with_id(1));
        let wrapped = create(&handle);

        let raw = rel(&factory, RefSource::from(wrapped)).unwrap();
        assert!(Arc::ptr_eq(&raw, &handle));

        let minted = rel::<Author, _>(&factory, RefSource::identifier(5)).unwrap();
        assert_eq!(minted.field("id"), Some(json!(5)));
    }

    proptest! {
        /// Re-pointing through any sequence of handles always leaves the
        /// reference reflecting the last one, and unwrapping never yields a
        /// reference.
        #[test]
        fn set_always_reflects_last_handle(ids in prop::collection::vec(0i64..1_000, 1..20)) {
            let handles: Vec<_> = ids
                .iter()
                .map(|id| EntityHandle::new(Author::with_id(*id)))
                .collect();
            let reference = create(&handles[0]);

            for handle in &handles {
                reference.set(handle);
                prop_assert!(Arc::ptr_eq(&reference.unwrap(), handle));
                prop_assert_eq!(reference.identifier("id"), Some(json!(handle.read().id)));
                let unwrapped: Related<Author> = unwrap_reference(&reference).into();
                prop_assert!(!is_reference(&unwrapped));
            }
        }
    }
}
