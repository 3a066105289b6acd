//! External document store.
//!
//! Models and quiz events live in a key-value document store that may be
//! replicated across devices. The engine only needs the operations of
//! [`ExternalStore`]; [`MemoryStore`] and [`SqliteStore`] implement it.
//!
//! Keys are ordered as strings, so everything under a sentence root is one
//! contiguous range (see [`crate::facts::related_range`]).

mod changes;
mod memory;
mod schema;
mod sqlite;

pub use changes::{ChangeFeed, ChangeNotification, ChangeSubscription, FeedItem};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A stored JSON document.
pub type Document = Value;

/// Read-modify-write step applied by [`ExternalStore::upsert`].
///
/// Receives the current document (`{}` when absent) and returns the new one.
pub type Merge = Box<dyn FnOnce(Document) -> Result<Document> + Send>;

/// Default capacity of a store's change feed.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Storage contract the engine depends on.
#[async_trait]
pub trait ExternalStore: Send + Sync {
    /// Document at `key`, `None` when absent or deleted.
    async fn get(&self, key: &str) -> Result<Option<Document>>;

    /// Atomically replace the document at `key` with `merge(current)`.
    async fn upsert(&self, key: &str, merge: Merge) -> Result<Document>;

    /// Write a document that must not exist yet. Fails with `Error::Conflict`.
    async fn put_new(&self, key: &str, doc: Document) -> Result<()>;

    /// Documents with `start <= key < end`, in key order.
    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Document)>>;

    /// Remove the document at `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Changes from now on, restricted to `keys` when given.
    fn subscribe_changes(&self, keys: Option<Vec<String>>) -> ChangeSubscription;
}

/// Wrap a closure as a [`Merge`].
pub fn merge_with<F>(f: F) -> Merge
where
    F: FnOnce(Document) -> Result<Document> + Send + 'static,
{
    Box::new(f)
}

/// Whether a document carries no fields (the unknown model).
pub fn is_empty_document(doc: &Document) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
