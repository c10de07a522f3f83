//! # Documents
//!
//! JSON documents grouped in collections, keyed by `_id`.
//!
//! ## Redis
//!
//! - One hash per collection (`docs:<collection>`), field is the `_id`, value is the JSON document
//! - Inserts use `HSETNX`, an existing `_id` is never overwritten
//! - Filters are evaluated in process after `HVALS`, the dataset is a small simulation
//! - Updates are read, merge, write. Concurrent updates of the same document are last writer wins per field
//! - Unique values are claimed with `HSETNX` on `unique:<collection>:<field>`, value to owning `_id`
use std::{
    collections::HashMap,
    fmt::{self, Display},
    str::FromStr,
    sync::RwLock,
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::query::Filter;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Employees,
    Skus,
    Locations,
    Orders,
    Tasks,
    TaskCollections,
    Exceptions,
    RootCauses,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Employees,
        Collection::Skus,
        Collection::Locations,
        Collection::Orders,
        Collection::Tasks,
        Collection::TaskCollections,
        Collection::Exceptions,
        Collection::RootCauses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Employees => "employees",
            Collection::Skus => "skus",
            Collection::Locations => "locations",
            Collection::Orders => "orders",
            Collection::Tasks => "tasks",
            Collection::TaskCollections => "taskCollections",
            Collection::Exceptions => "exceptions",
            Collection::RootCauses => "rootCauses",
        }
    }

    pub fn key(&self) -> String {
        format!("docs:{}", self.as_str())
    }

    pub fn unique_key(&self, field: &str) -> String {
        format!("unique:{}:{field}", self.as_str())
    }

    /// Fields that never leave the server.
    pub fn hidden_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Employees => &["password"],
            _ => &[],
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| format!("Unknown collection: {s}"))
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document {0} already exists")]
    DuplicateId(String),

    #[error("Corrupt document: {0}")]
    Corrupt(String),
}

impl From<RedisError> for DocumentError {
    fn from(error: RedisError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(error: serde_json::Error) -> Self {
        Self::Corrupt(error.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, DocumentError>;

    /// Stores a new document, assigning `_id` and timestamps when absent.
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, DocumentError>;

    /// Shallow merges `patch` into the document and returns the result, `None` if it does not exist.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, DocumentError>;

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, DocumentError>;

    /// Atomically reserves `value` of a unique `field` for document `id`.
    /// False when another document already holds it, true when `id` holds it now.
    async fn claim_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        id: &str,
    ) -> Result<bool, DocumentError>;

    async fn release_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<(), DocumentError>;
}

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

fn prepare_insert(mut document: Document) -> (String, Document) {
    let id = match document_id(&document) {
        Some(id) => id.to_string(),
        None => {
            let id = new_id();
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    };

    let timestamp = now();
    document
        .entry(CREATED_AT_FIELD)
        .or_insert_with(|| timestamp.clone());
    document.entry(UPDATED_AT_FIELD).or_insert(timestamp);

    (id, document)
}

fn apply_patch(document: &mut Document, patch: Document) {
    for (field, value) in patch {
        if field == ID_FIELD || field == CREATED_AT_FIELD {
            continue;
        }
        document.insert(field, value);
    }
    document.insert(UPDATED_AT_FIELD.to_string(), now());
}

fn sort_documents(documents: &mut [Document]) {
    documents.sort_by(|a, b| {
        let created = |d: &Document| d.get(CREATED_AT_FIELD).and_then(Value::as_str).map(str::to_owned);
        created(a)
            .cmp(&created(b))
            .then_with(|| document_id(a).cmp(&document_id(b)))
    });
}

/// Removes fields listed in [`Collection::hidden_fields`].
pub fn redact(collection: Collection, document: &mut Document) {
    for field in collection.hidden_fields() {
        document.remove(*field);
    }
}

pub struct RedisDocumentStore {
    connection: ConnectionManager,
}

impl RedisDocumentStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

fn decode(raw: &str) -> Result<Document, DocumentError> {
    match serde_json::from_str(raw)? {
        Value::Object(document) => Ok(document),
        other => Err(DocumentError::Corrupt(format!("expected object, found {other}"))),
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentError> {
        let mut connection = self.connection.clone();
        let raw: Vec<String> = connection.hvals(collection.key()).await?;

        let mut documents = raw
            .iter()
            .map(|raw| decode(raw))
            .collect::<Result<Vec<_>, _>>()?;
        documents.retain(|document| filter.matches(document));
        sort_documents(&mut documents);

        Ok(documents)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, DocumentError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.hget(collection.key(), id).await?;

        raw.as_deref().map(decode).transpose()
    }

    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, DocumentError> {
        let (id, document) = prepare_insert(document);
        let raw = serde_json::to_string(&document)?;

        let mut connection = self.connection.clone();
        let created: bool = connection.hset_nx(collection.key(), &id, raw).await?;

        if !created {
            return Err(DocumentError::DuplicateId(id));
        }

        Ok(document)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, DocumentError> {
        let Some(mut document) = self.find_by_id(collection, id).await? else {
            return Ok(None);
        };

        apply_patch(&mut document, patch);
        let raw = serde_json::to_string(&document)?;

        let mut connection = self.connection.clone();
        let _: () = connection.hset(collection.key(), id, raw).await?;

        Ok(Some(document))
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, DocumentError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.hdel(collection.key(), id).await?;

        Ok(removed > 0)
    }

    async fn claim_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        id: &str,
    ) -> Result<bool, DocumentError> {
        let key = collection.unique_key(field);
        let mut connection = self.connection.clone();

        let claimed: bool = connection.hset_nx(&key, value, id).await?;
        if claimed {
            return Ok(true);
        }

        let holder: Option<String> = connection.hget(&key, value).await?;
        Ok(holder.as_deref() == Some(id))
    }

    async fn release_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        let mut connection = self.connection.clone();
        let _: i64 = connection.hdel(collection.unique_key(field), value).await?;

        Ok(())
    }
}

/// Process-local documents, used by the `memory` backend and tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, HashMap<String, Document>>>,
    unique: RwLock<HashMap<(Collection, String, String), String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DocumentError {
        DocumentError::Unavailable("memory document store poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;

        let mut documents: Vec<Document> = collections
            .get(&collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_documents(&mut documents);

        Ok(documents)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, DocumentError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;

        Ok(collections
            .get(&collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, DocumentError> {
        let (id, document) = prepare_insert(document);
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        let documents = collections.entry(collection).or_default();
        if documents.contains_key(&id) {
            return Err(DocumentError::DuplicateId(id));
        }
        documents.insert(id, document.clone());

        Ok(document)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, DocumentError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(id))
        else {
            return Ok(None);
        };

        apply_patch(document, patch);

        Ok(Some(document.clone()))
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, DocumentError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        Ok(collections
            .get_mut(&collection)
            .and_then(|documents| documents.remove(id))
            .is_some())
    }

    async fn claim_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        id: &str,
    ) -> Result<bool, DocumentError> {
        let mut unique = self.unique.write().map_err(|_| Self::poisoned())?;

        let holder = unique
            .entry((collection, field.to_string(), value.to_string()))
            .or_insert_with(|| id.to_string());

        Ok(*holder == id)
    }

    async fn release_unique(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        let mut unique = self.unique.write().map_err(|_| Self::poisoned())?;
        unique.remove(&(collection, field.to_string(), value.to_string()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(document) => document,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_collection_parse() {
        assert_eq!(
            "taskCollections".parse::<Collection>(),
            Ok(Collection::TaskCollections)
        );
        assert!("task-collections".parse::<Collection>().is_err());
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = MemoryDocumentStore::new();

        let inserted = store
            .insert(Collection::Skus, doc(json!({ "name": "bolt" })))
            .await
            .unwrap();

        let id = document_id(&inserted).unwrap().to_string();
        assert_eq!(id.len(), 32);
        assert!(inserted.contains_key(CREATED_AT_FIELD));
        assert!(inserted.contains_key(UPDATED_AT_FIELD));

        let found = store.find_by_id(Collection::Skus, &id).await.unwrap();
        assert_eq!(found, Some(inserted));
    }

    #[tokio::test]
    async fn test_insert_keeps_given_id_and_rejects_duplicates() {
        let store = MemoryDocumentStore::new();

        store
            .insert(Collection::Orders, doc(json!({ "_id": "o1" })))
            .await
            .unwrap();

        let duplicate = store
            .insert(Collection::Orders, doc(json!({ "_id": "o1" })))
            .await;
        assert!(matches!(duplicate, Err(DocumentError::DuplicateId(id)) if id == "o1"));
    }

    #[tokio::test]
    async fn test_update_merges_and_protects_id() {
        let store = MemoryDocumentStore::new();
        store
            .insert(
                Collection::Employees,
                doc(json!({ "_id": "e1", "name": "Ada", "title": "Picker" })),
            )
            .await
            .unwrap();

        let updated = store
            .update_by_id(
                Collection::Employees,
                "e1",
                doc(json!({ "_id": "other", "title": "Lead" })),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated["_id"], "e1");
        assert_eq!(updated["name"], "Ada");
        assert_eq!(updated["title"], "Lead");

        let missing = store
            .update_by_id(Collection::Employees, "nope", Document::new())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryDocumentStore::new();
        store
            .insert(Collection::Tasks, doc(json!({ "_id": "t1" })))
            .await
            .unwrap();

        assert!(store.delete_by_id(Collection::Tasks, "t1").await.unwrap());
        assert!(!store.delete_by_id(Collection::Tasks, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_filters_and_orders() {
        let store = MemoryDocumentStore::new();
        for (id, zone, created) in [("b", "A", "2024-01-02"), ("a", "B", "2024-01-03"), ("c", "A", "2024-01-01")] {
            store
                .insert(
                    Collection::Skus,
                    doc(json!({ "_id": id, "zone": zone, "createdAt": created })),
                )
                .await
                .unwrap();
        }

        let found = store
            .find(Collection::Skus, &Filter::new().equals("zone", "A"))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().filter_map(document_id).collect();

        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_claim_unique() {
        let store = MemoryDocumentStore::new();

        assert!(store.claim_unique(Collection::RootCauses, "title", "Dropped", "r1").await.unwrap());
        assert!(store.claim_unique(Collection::RootCauses, "title", "Dropped", "r1").await.unwrap());
        assert!(!store.claim_unique(Collection::RootCauses, "title", "Dropped", "r2").await.unwrap());
        assert!(store.claim_unique(Collection::Skus, "title", "Dropped", "r2").await.unwrap());

        store
            .release_unique(Collection::RootCauses, "title", "Dropped")
            .await
            .unwrap();
        assert!(store.claim_unique(Collection::RootCauses, "title", "Dropped", "r2").await.unwrap());
    }

    #[test]
    fn test_redact() {
        let mut employee = doc(json!({ "name": "Ada", "password": "hash" }));
        redact(Collection::Employees, &mut employee);
        assert_eq!(employee, doc(json!({ "name": "Ada" })));

        let mut sku = doc(json!({ "password": "not hidden here" }));
        redact(Collection::Skus, &mut sku);
        assert!(sku.contains_key("password"));
    }
}
