//! Entities and collaborator doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use forgeorm_core::{
    Entity, EntityMeta, LoadOptions, OrmError, OrmResult, PrimaryKey, PropertyMeta,
    ReferenceOptions, Value, expect_primary_key_shape,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::collaborators::{EntityFactory, EntityInitializer, SnapshotComparator};
use crate::handle::EntityHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

impl Author {
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
            email: None,
        }
    }

    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: None,
        }
    }
}

static AUTHOR_META: LazyLock<EntityMeta> = LazyLock::new(|| {
    EntityMeta::new("Author", ["id"])
        .expect("valid metadata")
        .with_property(PropertyMeta::scalar("name"))
        .with_property(PropertyMeta::scalar("email"))
});

impl Entity for Author {
    fn meta() -> &'static EntityMeta {
        &AUTHOR_META
    }

    fn from_primary_key(pk: &PrimaryKey) -> OrmResult<Self> {
        expect_primary_key_shape(Self::meta(), pk)?;
        match pk {
            PrimaryKey::Single(Value::Number(n)) => n
                .as_i64()
                .map(Self::with_id)
                .ok_or_else(|| OrmError::malformed_identifier("Author", "id must be an integer")),
            _ => Err(OrmError::malformed_identifier("Author", "id must be an integer")),
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "email" => Some(json!(self.email)),
            _ => None,
        }
    }
}

/// Document-store style entity whose key is an object id with a separate
/// string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongoBook {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub title: Option<String>,
}

impl MongoBook {
    pub fn with_object_id(object_id: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            title: None,
        }
    }
}

static MONGO_BOOK_META: LazyLock<EntityMeta> = LazyLock::new(|| {
    EntityMeta::new("MongoBook", ["_id"])
        .expect("valid metadata")
        .with_serialized_primary_key("id")
        .with_property(PropertyMeta::scalar("title"))
});

impl Entity for MongoBook {
    fn meta() -> &'static EntityMeta {
        &MONGO_BOOK_META
    }

    fn from_primary_key(pk: &PrimaryKey) -> OrmResult<Self> {
        expect_primary_key_shape(Self::meta(), pk)?;
        let oid = match pk {
            PrimaryKey::Single(Value::String(s)) => Some(s.as_str()),
            PrimaryKey::Single(Value::Object(map)) => map.get("$oid").and_then(Value::as_str),
            _ => None,
        };
        oid.map(Self::with_object_id)
            .ok_or_else(|| OrmError::malformed_identifier("MongoBook", "expected an object id"))
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "_id" => Some(json!({ "$oid": self.object_id })),
            "id" => Some(json!(self.object_id)),
            "title" => Some(json!(self.title)),
            _ => None,
        }
    }
}

/// Initializer serving rows from memory and counting invocations.
///
/// Yields once before hydrating so that concurrent loads interleave.
#[derive(Default)]
pub struct CountingInitializer {
    rows: HashMap<String, Value>,
    calls: AtomicUsize,
    last_options: Mutex<Option<LoadOptions>>,
}

impl CountingInitializer {
    pub fn with_rows<I>(authors: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (i64, &'static str)>,
    {
        let rows = authors
            .into_iter()
            .map(|(id, name)| (id.to_string(), json!({ "id": id, "name": name, "email": null })))
            .collect();
        Arc::new(Self {
            rows,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<LoadOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T: Entity> EntityInitializer<T> for CountingInitializer {
    async fn init(&self, handle: Arc<EntityHandle<T>>, options: LoadOptions) -> OrmResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        tokio::task::yield_now().await;

        let key = handle.get_serialized_primary_key().unwrap_or_default();
        let row = self
            .rows
            .get(&key)
            .cloned()
            .ok_or_else(|| OrmError::not_found(&T::meta().class_name, &key))?;
        handle.hydrate(serde_json::from_value::<T>(row)?);
        Ok(())
    }
}

/// Entity factory minting fresh, managed handles.
pub struct TestFactory {
    initializer: Arc<CountingInitializer>,
    comparator: SnapshotComparator,
    created: AtomicUsize,
    last_options: Mutex<Option<ReferenceOptions>>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self {
            initializer: CountingInitializer::with_rows([]),
            comparator: SnapshotComparator,
            created: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<ReferenceOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

impl EntityFactory for TestFactory {
    type Comparator = SnapshotComparator;

    fn create_reference<T: Entity>(
        &self,
        pk: PrimaryKey,
        options: &ReferenceOptions,
    ) -> OrmResult<Arc<EntityHandle<T>>> {
        *self.last_options.lock().unwrap() = Some(options.clone());
        let handle = EntityHandle::new(T::from_primary_key(&pk)?);
        handle.set_initializer(Arc::<CountingInitializer>::downgrade(&self.initializer));
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn comparator(&self) -> &Self::Comparator {
        &self.comparator
    }
}
