//! Primary-key values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Separator used when a composite key is flattened into a single string.
pub const COMPOSITE_KEY_SEPARATOR: &str = "~~~";

/// Primary-key value of an entity.
///
/// Single-column keys hold one scalar; composite keys hold one value per
/// declared primary-key field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Composite(Vec<Value>),
    Single(Value),
}

impl PrimaryKey {
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }

    pub fn composite<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Composite(values.into_iter().map(Into::into).collect())
    }

    /// Number of key parts.
    pub fn arity(&self) -> usize {
        match self {
            PrimaryKey::Single(_) => 1,
            PrimaryKey::Composite(parts) => parts.len(),
        }
    }

    /// Key parts in declaration order.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            PrimaryKey::Single(v) => vec![v],
            PrimaryKey::Composite(parts) => parts.iter().collect(),
        }
    }

    /// True if no part of the key is null.
    pub fn is_complete(&self) -> bool {
        self.values().iter().all(|v| !v.is_null())
    }

    /// Flatten the key into its string form (`7`, `abc`, `1~~~2`).
    pub fn serialize(&self) -> String {
        self.values()
            .into_iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(COMPOSITE_KEY_SEPARATOR)
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl core::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.serialize())
    }
}

macro_rules! impl_single_key_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for PrimaryKey {
                fn from(value: $t) -> Self {
                    Self::Single(Value::from(value))
                }
            }
        )*
    };
}

impl_single_key_from!(i32, i64, u32, u64, &str, String);

impl From<Uuid> for PrimaryKey {
    fn from(value: Uuid) -> Self {
        Self::Single(Value::String(value.to_string()))
    }
}

impl From<Vec<Value>> for PrimaryKey {
    fn from(value: Vec<Value>) -> Self {
        Self::Composite(value)
    }
}
