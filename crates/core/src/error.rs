//! Error model shared by the reference layer and its collaborators.

use thiserror::Error;

/// Result type used across the ORM layer.
pub type OrmResult<T> = Result<T, OrmError>;

/// ORM-level error.
///
/// The reference layer never translates errors coming from its collaborators:
/// whatever an initializer or entity factory returns reaches the caller as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrmError {
    /// A synchronous accessor was used before the entity was materialized.
    #[error("Reference<{entity}> {primary_key} not initialized")]
    NotInitialized { entity: String, primary_key: String },

    /// The handle is not attached to any unit of work, so it cannot be loaded.
    #[error("entity {entity} ({primary_key}) is not managed by a unit of work")]
    NotManaged { entity: String, primary_key: String },

    /// An identifier did not match the shape declared by the entity metadata.
    #[error("malformed identifier for {entity}: {reason}")]
    MalformedIdentifier { entity: String, reason: String },

    /// Entity metadata is inconsistent (e.g. no primary key declared).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The referenced row does not exist in the backing store.
    #[error("{entity} not found ({primary_key})")]
    NotFound { entity: String, primary_key: String },

    /// A pessimistic lock could not be acquired.
    #[error("lock wait timeout: {0}")]
    LockWaitTimeout(String),

    /// Any other fetch failure reported by the backing store.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Converting an entity to or from JSON failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An internal lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl OrmError {
    pub fn not_initialized(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::NotInitialized {
            entity: entity.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn not_managed(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::NotManaged {
            entity: entity.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn malformed_identifier(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn not_found(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn lock_wait_timeout(msg: impl Into<String>) -> Self {
        Self::LockWaitTimeout(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn poisoned(what: impl Into<String>) -> Self {
        Self::Poisoned(what.into())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(value: serde_json::Error) -> Self {
        Self::serialization(value.to_string())
    }
}
