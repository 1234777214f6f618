//! Entity trait: identity + field access keyed off metadata.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::meta::EntityMeta;
use crate::primary_key::PrimaryKey;

/// A persisted entity type.
///
/// Field access is by name so that references can project identifier fields
/// from metadata without knowing the concrete type. Entities round-trip through
/// JSON so stores can hydrate them from rows.
pub trait Entity:
    core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + Sized + 'static
{
    /// Metadata shared by every instance of this type.
    fn meta() -> &'static EntityMeta;

    /// Build an instance with only its identifier fields set.
    ///
    /// Implementations reject identifiers whose shape does not match the
    /// declared primary keys with `OrmError::MalformedIdentifier`.
    fn from_primary_key(pk: &PrimaryKey) -> OrmResult<Self>;

    /// Current value of a field, `None` if the field is unknown.
    fn field(&self, name: &str) -> Option<Value>;

    /// Primary key assembled from the declared primary-key fields.
    ///
    /// Returns `None` when any key field is unknown.
    fn primary_key(&self) -> Option<PrimaryKey> {
        let meta = Self::meta();
        let mut parts = Vec::with_capacity(meta.primary_keys.len());
        for name in &meta.primary_keys {
            parts.push(self.field(name)?);
        }

        if parts.len() == 1 {
            parts.pop().map(PrimaryKey::Single)
        } else {
            Some(PrimaryKey::Composite(parts))
        }
    }

    /// String form of the primary key.
    ///
    /// Uses the distinct serialized-key field when the metadata declares one.
    fn serialized_primary_key(&self) -> Option<String> {
        match Self::meta().distinct_serialized_primary_key() {
            Some(field) => match self.field(field)? {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            },
            None => self.primary_key().map(|pk| pk.serialize()),
        }
    }
}

/// Check that `pk` has one part per declared primary key and no null parts.
///
/// Intended for `Entity::from_primary_key` implementations.
pub fn expect_primary_key_shape(meta: &EntityMeta, pk: &PrimaryKey) -> OrmResult<()> {
    let expected = meta.primary_keys.len();
    if pk.arity() != expected {
        return Err(OrmError::malformed_identifier(
            &meta.class_name,
            format!("expected {expected} key part(s), got {}", pk.arity()),
        ));
    }
    if !pk.is_complete() {
        return Err(OrmError::malformed_identifier(
            &meta.class_name,
            "key contains null parts",
        ));
    }
    Ok(())
}
