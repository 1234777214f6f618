//! Configuration of the in-memory unit of work.

/// Unit-of-work configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWorkConfig {
    /// Name for logging
    pub name: String,
    /// Whether created and loaded entities are tracked in the identity map.
    ///
    /// With the map disabled every `create_reference` mints a new handle.
    pub identity_map: bool,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            name: "unit-of-work".to_string(),
            identity_map: true,
        }
    }
}

impl UnitOfWorkConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_identity_map(mut self, enabled: bool) -> Self {
        self.identity_map = enabled;
        self
    }
}
