use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{compare_values, Direction, Document, DocumentStore, Query, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get { collection: String, key: String },
    Find { collection: String, query: Query },
    Update { collection: String, key: String, fields: Vec<String> },
}

impl StoreCall {
    pub fn collection(&self) -> &str {
        match self {
            StoreCall::Get { collection, .. }
            | StoreCall::Find { collection, .. }
            | StoreCall::Update { collection, .. } => collection,
        }
    }
}

/// In-process store keeping insertion order. Records every call and can be
/// told to fail all operations on a collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, doc: Document) {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let docs = collections.entry(collection.to_owned()).or_default();
        match docs.iter_mut().find(|d| d.key == doc.key) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    pub fn with(self, collection: &str, doc: Document) -> Self {
        self.insert(collection, doc);
        self
    }

    pub fn fail_on(&self, collection: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(collection.to_owned());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: StoreCall) -> StoreResult<()> {
        let collection = call.collection().to_owned();
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        if self.failing.lock().unwrap_or_else(|e| e.into_inner()).contains(&collection) {
            return Err(StoreError::Unavailable(format!("{collection} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        self.record(StoreCall::Get {
            collection: collection.to_owned(),
            key: key.to_owned(),
        })?;
        Ok(self
            .snapshot(collection)
            .into_iter()
            .find(|d| d.key == key))
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.record(StoreCall::Find {
            collection: collection.to_owned(),
            query: query.clone(),
        })?;

        let mut docs: Vec<Document> = self
            .snapshot(collection)
            .into_iter()
            .filter(|d| query.filters.iter().all(|f| f.matches(d)))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            docs.sort_by(|a, b| {
                let null = serde_json::Value::Null;
                let ord = compare_values(a.get(field).unwrap_or(&null), b.get(field).unwrap_or(&null));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn update(&self, collection: &str, doc: &Document) -> StoreResult<()> {
        self.record(StoreCall::Update {
            collection: collection.to_owned(),
            key: doc.key.clone(),
            fields: doc.fields.keys().cloned().collect(),
        })?;
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let docs = collections.entry(collection.to_owned()).or_default();
        match docs.iter_mut().find(|d| d.key == doc.key) {
            Some(existing) => existing.fields.extend(doc.fields.clone()),
            None => docs.push(doc.clone()),
        }
        Ok(())
    }
}
