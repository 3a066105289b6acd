//! Keeping a snapshot in step with the store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::snapshot::{merge_change, SharedSnapshot};
use crate::error::Result;
use crate::events::{NullEmitter, ReviewEmitter, StudyEvent};
use crate::facts::Key;
use crate::recall::{decode_model, RecallModel};
use crate::store::{ChangeNotification, ChangeSubscription, ExternalStore, FeedItem};

/// Feeds store changes for a fixed key set into one [`SharedSnapshot`].
///
/// Subscribes before the bulk load, so a write racing the load is still
/// delivered afterwards. Local writes go in as provisional and are
/// overwritten by whatever the store reports next for that key.
pub struct SyncBridge {
    store: Arc<dyn ExternalStore>,
    keys: Vec<Key>,
    snapshot: SharedSnapshot,
    subscription: ChangeSubscription,
    emitter: Arc<dyn ReviewEmitter>,
}

impl SyncBridge {
    /// Subscribe to `keys` without loading anything yet.
    pub fn new(store: Arc<dyn ExternalStore>, keys: Vec<Key>, snapshot: SharedSnapshot) -> Self {
        let watched = keys.iter().map(|k| k.to_string()).collect();
        let subscription = store.subscribe_changes(Some(watched));
        Self {
            store,
            keys,
            snapshot,
            subscription,
            emitter: Arc::new(NullEmitter),
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn ReviewEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Subscribe, then bulk-load every key into the snapshot.
    pub async fn connect(
        store: Arc<dyn ExternalStore>,
        keys: Vec<Key>,
        snapshot: SharedSnapshot,
    ) -> Result<Self> {
        let bridge = Self::new(store, keys, snapshot);
        bridge.load().await?;
        Ok(bridge)
    }

    pub fn snapshot(&self) -> &SharedSnapshot {
        &self.snapshot
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Read every watched key from the store and replace the snapshot.
    pub async fn load(&self) -> Result<usize> {
        let mut models = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let model = match self.store.get(key.as_str()).await? {
                Some(doc) => decode_model(&doc)?,
                None => None,
            };
            models.push((key.clone(), model));
        }
        let learned = models.iter().filter(|(_, m)| m.is_some()).count();
        self.snapshot.write().load(models);
        info!(keys = self.keys.len(), learned, "loaded models");
        Ok(learned)
    }

    /// Record a local write before its notification arrives.
    pub fn apply_local(&self, key: Key, model: Option<RecallModel>) {
        self.snapshot.write().apply_local(key, model);
    }

    fn merge(&self, change: &ChangeNotification, now: DateTime<Utc>) -> Option<Key> {
        let merged = merge_change(&mut self.snapshot.write(), change);
        match merged {
            Ok(Some(key)) => {
                debug!(key = %key, deleted = change.deleted, "snapshot updated from store");
                self.emitter
                    .emit(StudyEvent::synced(key.as_str(), change.deleted, now));
                Some(key)
            }
            Ok(None) => None,
            Err(e) => {
                // Keep the previous value; a later change may be readable.
                warn!(key = %change.key, error = %e, "ignoring unreadable model document");
                self.emitter
                    .emit(StudyEvent::error(Some(&change.key), e.to_string(), now));
                None
            }
        }
    }

    async fn reload_after_lag(&self, skipped: u64) -> Result<()> {
        warn!(skipped, keys = self.keys.len(), "change feed lagged, reloading snapshot");
        self.load().await?;
        Ok(())
    }

    /// Merge every notification already queued. Returns the keys that changed.
    ///
    /// If the subscription lagged, notifications were lost; the snapshot is
    /// reloaded from the store and every watched key is reported.
    pub async fn pump(&mut self, now: DateTime<Utc>) -> Result<Vec<Key>> {
        let mut changed = Vec::new();
        let mut skipped = 0;
        for item in self.subscription.drain() {
            match item {
                FeedItem::Changed(change) => changed.extend(self.merge(&change, now)),
                FeedItem::Lagged(n) => skipped += n,
            }
        }
        if skipped > 0 {
            self.reload_after_lag(skipped).await?;
            return Ok(self.keys.clone());
        }
        Ok(changed)
    }

    /// Wait for the next notification and merge it, reloading on lag.
    ///
    /// Returns `None` once the subscription is released or the store closed.
    pub async fn next_change(&mut self, now: DateTime<Utc>) -> Result<Option<FeedItem>> {
        let Some(item) = self.subscription.next().await else {
            return Ok(None);
        };
        match &item {
            FeedItem::Changed(change) => {
                self.merge(change, now);
            }
            FeedItem::Lagged(skipped) => self.reload_after_lag(*skipped).await?,
        }
        Ok(Some(item))
    }

    /// Stop listening. Idempotent; the snapshot keeps its last state.
    pub fn release(&mut self) {
        if !self.subscription.is_released() {
            debug!("releasing change subscription");
        }
        self.subscription.release();
    }

    pub fn is_released(&self) -> bool {
        self.subscription.is_released()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEmitter, StudyEventType, Verbosity};
    use crate::recall::{encode_model, initialize_model, merge_model, ReviewResult};
    use crate::store::{merge_with, MemoryStore};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn keys() -> Vec<Key> {
        vec![
            Key::from_raw("model/猫/meaning"),
            Key::from_raw("model/猫/reading"),
        ]
    }

    #[tokio::test]
    async fn test_connect_loads_existing_models() {
        let store = Arc::new(MemoryStore::new());
        let fresh = initialize_model(t0());
        store
            .apply_remote("model/猫/meaning", encode_model(&fresh).unwrap())
            .unwrap();

        let bridge = SyncBridge::connect(store, keys(), SharedSnapshot::new())
            .await
            .unwrap();
        let models = bridge.snapshot().models_for(bridge.keys());
        assert_eq!(models[0].1, Some(fresh));
        assert_eq!(models[1].1, None);
    }

    #[tokio::test]
    async fn test_pump_confirms_local_write() {
        let store = Arc::new(MemoryStore::new());
        let emitter = Arc::new(CollectingEmitter::new().with_verbosity(Verbosity::Debug));
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap()
            .with_emitter(emitter.clone());

        let key = keys()[0].clone();
        let local = initialize_model(t0());
        bridge.apply_local(key.clone(), Some(local));
        assert!(bridge.snapshot().read().is_provisional(&key));

        // The store ends up with a different value than the local guess.
        let stored = local
            .update(ReviewResult::Success, 1.0, t0() + Duration::hours(1), &Default::default())
            .unwrap();
        store
            .upsert(
                key.as_str(),
                merge_with(move |doc| merge_model(doc, &stored)),
            )
            .await
            .unwrap();

        let changed = bridge.pump(t0()).await.unwrap();
        assert_eq!(changed, vec![key.clone()]);
        assert_eq!(bridge.snapshot().get(&key), Some(stored));
        assert!(!bridge.snapshot().read().is_provisional(&key));
        assert_eq!(emitter.events_of(StudyEventType::Synced).len(), 1);
    }

    #[tokio::test]
    async fn test_unwatched_keys_and_bad_documents_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap();

        store
            .apply_remote("model/犬/meaning", encode_model(&initialize_model(t0())).unwrap())
            .unwrap();
        store
            .apply_remote("model/猫/reading", json!({"strengthA": "lots"}))
            .unwrap();

        assert!(bridge.pump(t0()).await.unwrap().is_empty());
        assert_eq!(bridge.snapshot().read().learned_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_delete_forgets_model() {
        let store = Arc::new(MemoryStore::new());
        let key = keys()[1].clone();
        store
            .apply_remote(key.as_str(), encode_model(&initialize_model(t0())).unwrap())
            .unwrap();
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap();
        assert!(bridge.snapshot().get(&key).is_some());

        store.delete(key.as_str()).await.unwrap();
        let change = bridge.next_change(t0()).await.unwrap().unwrap();
        assert!(change.into_change().unwrap().deleted);
        assert_eq!(bridge.snapshot().get(&key), None);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap();
        bridge.release();
        bridge.release();
        assert!(bridge.is_released());

        store
            .apply_remote(keys()[0].as_str(), encode_model(&initialize_model(t0())).unwrap())
            .unwrap();
        assert!(bridge.pump(t0()).await.unwrap().is_empty());
        assert!(bridge.next_change(t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pump_reloads_after_lag() {
        let store = Arc::new(MemoryStore::with_feed_capacity(2));
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap();
        let (meaning, reading) = (keys()[0].clone(), keys()[1].clone());

        let first = initialize_model(t0());
        store
            .apply_remote(meaning.as_str(), encode_model(&first).unwrap())
            .unwrap();
        for hours in 1..=3 {
            let model = initialize_model(t0() + Duration::hours(hours));
            store
                .apply_remote(reading.as_str(), encode_model(&model).unwrap())
                .unwrap();
        }

        // the notification for `meaning` fell off the feed
        let changed = bridge.pump(t0()).await.unwrap();
        assert_eq!(changed, keys());
        assert_eq!(bridge.snapshot().get(&meaning), Some(first));
        assert_eq!(
            bridge.snapshot().get(&reading),
            Some(initialize_model(t0() + Duration::hours(3)))
        );
    }

    #[tokio::test]
    async fn test_next_change_reloads_after_lag() {
        let store = Arc::new(MemoryStore::with_feed_capacity(1));
        let mut bridge = SyncBridge::connect(store.clone(), keys(), SharedSnapshot::new())
            .await
            .unwrap();
        let fresh = initialize_model(t0());
        for key in keys() {
            store
                .apply_remote(key.as_str(), encode_model(&fresh).unwrap())
                .unwrap();
        }

        let item = bridge.next_change(t0()).await.unwrap().unwrap();
        assert!(item.is_lagged());
        assert_eq!(bridge.snapshot().read().learned_count(), 2);
    }
}
