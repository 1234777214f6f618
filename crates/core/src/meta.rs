//! Entity metadata: declared type name, primary keys, properties.

use crate::error::{OrmError, OrmResult};

/// Kind of a declared property.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    ManyToOne,
    OneToOne,
}

/// Metadata of a single entity property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    pub name: String,
    pub kind: PropertyKind,
    /// Whether values of this to-one property are exposed as `Reference`s.
    pub wrapped_reference: bool,
    /// Target entity class name for relations.
    pub target: Option<String>,
}

impl PropertyMeta {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar,
            wrapped_reference: false,
            target: None,
        }
    }

    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::ManyToOne,
            wrapped_reference: false,
            target: Some(target.into()),
        }
    }

    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::OneToOne,
            wrapped_reference: false,
            target: Some(target.into()),
        }
    }

    /// Mark the relation as exposed through a `Reference` wrapper.
    pub fn wrapped(mut self) -> Self {
        self.wrapped_reference = true;
        self
    }

    pub fn is_relation(&self) -> bool {
        !matches!(self.kind, PropertyKind::Scalar)
    }
}

/// Metadata of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub class_name: String,
    /// Primary-key fields in declaration order. Never empty.
    pub primary_keys: Vec<String>,
    /// Optional field holding a display/serialized form of the key.
    pub serialized_primary_key: Option<String>,
    pub properties: Vec<PropertyMeta>,
}

impl EntityMeta {
    pub fn new<I, S>(class_name: impl Into<String>, primary_keys: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let class_name = class_name.into();
        let primary_keys: Vec<String> = primary_keys.into_iter().map(Into::into).collect();
        if primary_keys.is_empty() {
            return Err(OrmError::invalid_metadata(format!(
                "{class_name} declares no primary key"
            )));
        }

        Ok(Self {
            class_name,
            primary_keys,
            serialized_primary_key: None,
            properties: Vec::new(),
        })
    }

    pub fn with_serialized_primary_key(mut self, field: impl Into<String>) -> Self {
        self.serialized_primary_key = Some(field.into());
        self
    }

    pub fn with_property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    pub fn is_primary_key(&self, field: &str) -> bool {
        self.primary_keys.iter().any(|pk| pk == field)
    }

    pub fn is_composite(&self) -> bool {
        self.primary_keys.len() > 1
    }

    /// The serialized primary-key field, when it differs from the first primary key.
    pub fn distinct_serialized_primary_key(&self) -> Option<&str> {
        self.serialized_primary_key
            .as_deref()
            .filter(|spk| self.primary_keys.first().map(String::as_str) != Some(*spk))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name == name)
    }
}
