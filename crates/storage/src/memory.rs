//! In-memory [`DocumentStore`].
//!
//! A lock-protected map of collections.  Single-process only: state is
//! lost on restart and never shared across instances.  Used for
//! development, tests, and as the fallback when the durable backend is
//! unreachable at bootstrap.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde_json::Value;

use sous_domain::error::Result;

use crate::document::{DocumentStore, UpdateFn};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), doc);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut collections = self.collections.write();
        let entry = collections
            .entry(collection.to_owned())
            .or_default()
            .entry(id.to_owned())
            .or_insert_with(|| Value::Object(Default::default()));

        if let (Value::Object(doc), Value::Object(fields)) = (entry, patch) {
            for (k, v) in fields {
                doc.insert(k, v);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write();
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn transactional_update(
        &self,
        collection: &str,
        id: &str,
        update: UpdateFn,
    ) -> Result<Value> {
        // The write lock serializes concurrent updates to the same doc.
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_owned()).or_default();
        let current = coll.get(id).cloned();
        let next = update(current);
        coll.insert(id.to_owned(), next.clone());
        Ok(next)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
