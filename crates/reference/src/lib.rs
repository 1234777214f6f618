//! `forgeorm-reference` — lazy to-one references.
//!
//! A [`Reference`] stands in for an associated entity without fetching it:
//! its identifier is readable right away, the rest of the entity is loaded
//! explicitly with [`Reference::load`] through the unit of work that manages
//! the entity.
//!
//! Fetching, identity maps and change tracking live behind the traits in
//! [`collaborators`].

pub mod collaborators;
pub mod factory;
pub mod handle;
pub mod reference;

#[cfg(test)]
pub(crate) mod test_support;

pub use collaborators::{EntityComparator, EntityFactory, EntityInitializer, SnapshotComparator};
pub use factory::{
    RefSource, create, create_from_pk, create_naked_from_pk, is_reference, reference, rel,
    unwrap_reference, wrap_reference,
};
pub use handle::EntityHandle;
pub use reference::{Reference, Related};
