//! `forgeorm-core` — ORM building blocks.
//!
//! This crate contains **pure** primitives shared by the reference layer and
//! its collaborators (no IO, no async).

pub mod entity;
pub mod error;
pub mod meta;
pub mod options;
pub mod primary_key;

pub use entity::{Entity, expect_primary_key_shape};
pub use error::{OrmError, OrmResult};
pub use meta::{EntityMeta, PropertyKind, PropertyMeta};
pub use options::{ConnectionType, LoadOptions, LockMode, ReferenceOptions};
pub use primary_key::{COMPOSITE_KEY_SEPARATOR, PrimaryKey};

/// Loosely-typed field value.
pub type Value = serde_json::Value;

/// Snapshot of entity field values, keyed by field name.
pub type EntityData = serde_json::Map<String, Value>;
