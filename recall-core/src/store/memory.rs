//! In-process store backed by an ordered map.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{
    ChangeFeed, ChangeNotification, ChangeSubscription, Document, ExternalStore, Merge,
    DEFAULT_FEED_CAPACITY,
};
use crate::error::{Error, Result};

/// In-memory [`ExternalStore`].
///
/// Every write publishes a change notification synchronously, before the
/// call returns.
#[derive(Debug)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Document>>,
    feed: ChangeFeed,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
            feed: ChangeFeed::new(capacity),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Document>>> {
        self.docs
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock memory store: {}", e)))
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `doc` as if it arrived by replication: no local merge, but
    /// subscribers are notified.
    pub fn apply_remote(&self, key: &str, doc: Document) -> Result<()> {
        self.lock()?.insert(key.to_string(), doc.clone());
        self.feed.publish(ChangeNotification::updated(key, doc));
        Ok(())
    }
}

#[async_trait]
impl ExternalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn upsert(&self, key: &str, merge: Merge) -> Result<Document> {
        let updated = {
            let mut docs = self.lock()?;
            let current = docs.get(key).cloned().unwrap_or_else(|| json!({}));
            let updated = merge(current)?;
            docs.insert(key.to_string(), updated.clone());
            updated
        };
        debug!(key, "memory store upsert");
        self.feed
            .publish(ChangeNotification::updated(key, updated.clone()));
        Ok(updated)
    }

    async fn put_new(&self, key: &str, doc: Document) -> Result<()> {
        {
            let mut docs = self.lock()?;
            if docs.contains_key(key) {
                return Err(Error::Conflict(key.to_string()));
            }
            docs.insert(key.to_string(), doc.clone());
        }
        self.feed.publish(ChangeNotification::updated(key, doc));
        Ok(())
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Document)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let docs = self.lock()?;
        Ok(docs
            .range(start.to_string()..end.to_string())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        debug!(key, "memory store delete");
        self.feed.publish(ChangeNotification::deleted(key));
        Ok(())
    }

    fn subscribe_changes(&self, keys: Option<Vec<String>>) -> ChangeSubscription {
        self.feed.subscribe(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{merge_with, FeedItem};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_upsert_starts_from_empty_document() {
        let store = MemoryStore::new();
        let doc = store
            .upsert(
                "model/a/meaning",
                merge_with(|current| {
                    assert_eq!(current, json!({}));
                    Ok(json!({"n": 1}))
                }),
            )
            .await
            .unwrap();
        assert_eq!(doc, json!({"n": 1}));
        assert_eq!(
            store.get("model/a/meaning").await.unwrap(),
            Some(json!({"n": 1}))
        );
    }

    #[tokio::test]
    async fn test_failed_merge_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .upsert(
                "model/a/meaning",
                merge_with(|_| Err(Error::model("nope"))),
            )
            .await;
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_new_conflicts() {
        let store = MemoryStore::new();
        store.put_new("quiz/1", json!({})).await.unwrap();
        let err = store.put_new("quiz/1", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_range_is_half_open_and_ordered() {
        let store = MemoryStore::new();
        for key in [
            "model/猫/reading",
            "model/猫/meaning",
            "model/猫が好き/meaning",
            "model/犬/meaning",
        ] {
            store.put_new(key, json!({"k": key})).await.unwrap();
        }
        let (start, end) = crate::facts::related_range("model/猫");
        let keys: Vec<String> = store
            .range(&start, &end)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["model/猫/meaning", "model/猫/reading"]);
        assert!(store.range(&end, &start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_notify_subscribers() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_changes(None);

        store
            .upsert("model/a/meaning", merge_with(|_| Ok(json!({"n": 1}))))
            .await
            .unwrap();
        store.delete("model/a/meaning").await.unwrap();

        let changes: Vec<_> = sub
            .drain()
            .into_iter()
            .filter_map(FeedItem::into_change)
            .collect();
        assert_eq!(changes.len(), 2);
        assert!(!changes[0].deleted);
        assert!(changes[1].deleted);
        assert_eq!(store.get("model/a/meaning").await.unwrap(), None);
    }
}
