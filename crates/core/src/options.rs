//! Options forwarded by references to their collaborators.

use serde::{Deserialize, Serialize};

/// Row lock requested while materializing an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    None,
    Optimistic,
    PessimisticRead,
    PessimisticWrite,
    PessimisticPartialWrite,
    PessimisticWriteOrFail,
    PessimisticReadOrFail,
}

impl LockMode {
    pub fn is_pessimistic(self) -> bool {
        !matches!(self, LockMode::None | LockMode::Optimistic)
    }
}

/// Which connection a fetch should be routed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Read,
    Write,
}

/// Options for `Reference::load_with`.
///
/// The reference layer does not interpret any of these; they are handed to
/// the entity's initializer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Relation paths to populate along with the entity.
    pub populate: Vec<String>,
    pub lock_mode: Option<LockMode>,
    pub connection_type: Option<ConnectionType>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_populate<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.populate.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = Some(lock_mode);
        self
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }
}

/// Options for building a skeletal entity from a bare identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceOptions {
    /// Register the new skeletal entity in the identity map.
    pub merge: bool,
    pub convert_custom_types: bool,
    /// Schema/namespace qualifier, passed through to the entity factory.
    pub schema: Option<String>,
}

impl ReferenceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_convert_custom_types(mut self, convert: bool) -> Self {
        self.convert_custom_types = convert;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_options_builder() {
        let opts = LoadOptions::new()
            .with_populate(["books", "books.tags"])
            .with_lock_mode(LockMode::PessimisticWrite)
            .with_connection_type(ConnectionType::Write);

        assert_eq!(opts.populate, vec!["books".to_string(), "books.tags".to_string()]);
        assert_eq!(opts.lock_mode, Some(LockMode::PessimisticWrite));
        assert_eq!(opts.connection_type, Some(ConnectionType::Write));
    }

    #[test]
    fn reference_options_default_to_no_merge() {
        let opts = ReferenceOptions::default();
        assert!(!opts.merge);
        assert!(!opts.convert_custom_types);
        assert_eq!(opts.schema, None);

        let opts = opts.with_schema("tenant_a").with_merge(true);
        assert!(opts.merge);
        assert_eq!(opts.schema.as_deref(), Some("tenant_a"));
    }

    #[test]
    fn pessimistic_modes() {
        assert!(LockMode::PessimisticRead.is_pessimistic());
        assert!(!LockMode::Optimistic.is_pessimistic());
        assert!(!LockMode::None.is_pessimistic());
    }
}
