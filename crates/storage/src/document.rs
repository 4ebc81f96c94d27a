//! Document store abstraction.
//!
//! Collections of JSON documents keyed by ID.  Subcollections are
//! addressed with slash-separated collection paths (e.g.
//! `profiles/u1/feedback`).  Two implementations exist: a Firestore
//! REST client for production and an in-memory map for development,
//! tests, and the durable-backend fallback.

use serde_json::Value;

use sous_domain::error::Result;

/// Read-modify-write closure for [`DocumentStore::transactional_update`].
/// Receives the current document (`None` when absent) and returns the
/// full replacement document.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Value + Send>;

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.  `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Create or fully replace one document.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()>;

    /// Merge top-level fields into a document, creating it if absent.
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    /// Delete one document.  Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Atomically read, transform, and write one document, returning
    /// the committed value.  Concurrent writers to the same document
    /// are serialized.
    async fn transactional_update(
        &self,
        collection: &str,
        id: &str,
        update: UpdateFn,
    ) -> Result<Value>;

    /// List all documents in a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// Cheap liveness probe, used by the bootstrap readiness poll.
    async fn is_ready(&self) -> bool;

    /// Short tag identifying the backend ("firestore" or "memory").
    fn backend(&self) -> &'static str;
}
