//! In-memory view of the stored models.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{trace, warn};

use crate::error::Result;
use crate::facts::Key;
use crate::recall::{decode_model, RecallModel};
use crate::store::{is_empty_document, ChangeNotification};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    model: Option<RecallModel>,
    /// Written locally, not yet confirmed by a change notification.
    provisional: bool,
}

/// Latest known model per key.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    entries: HashMap<Key, Entry>,
}

impl ModelSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a bulk load from the store.
    pub fn load(&mut self, models: impl IntoIterator<Item = (Key, Option<RecallModel>)>) {
        self.entries = models
            .into_iter()
            .map(|(key, model)| {
                (
                    key,
                    Entry {
                        model,
                        provisional: false,
                    },
                )
            })
            .collect();
    }

    /// Record a local write ahead of its change notification.
    pub fn apply_local(&mut self, key: Key, model: Option<RecallModel>) {
        self.entries.insert(
            key,
            Entry {
                model,
                provisional: true,
            },
        );
    }

    /// Model of `key`, `None` when unknown.
    pub fn get(&self, key: &Key) -> Option<RecallModel> {
        self.entries.get(key).and_then(|entry| entry.model)
    }

    /// Whether `key`'s current value is a local write still awaiting confirmation.
    pub fn is_provisional(&self, key: &Key) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.provisional)
    }

    /// Models of `keys`, in the given order.
    pub fn models_for(&self, keys: &[Key]) -> Vec<(Key, Option<RecallModel>)> {
        keys.iter().map(|key| (key.clone(), self.get(key))).collect()
    }

    /// Number of keys with a model.
    pub fn learned_count(&self) -> usize {
        self.entries.values().filter(|e| e.model.is_some()).count()
    }
}

/// Fold one change notification into `snapshot`.
///
/// Deletions and empty documents make the key unknown; anything else
/// replaces the current value, provisional or not. Changes to non-model keys
/// are ignored. Returns the key when the snapshot changed.
pub fn merge_change(
    snapshot: &mut ModelSnapshot,
    change: &ChangeNotification,
) -> Result<Option<Key>> {
    let key = Key::from_raw(change.key.as_str());
    if !key.is_model_key() {
        return Ok(None);
    }

    let model = match &change.doc {
        _ if change.deleted => None,
        None => None,
        Some(doc) if is_empty_document(doc) => None,
        Some(doc) => decode_model(doc)?,
    };

    let entry = Entry {
        model,
        provisional: false,
    };
    if snapshot.entries.get(&key) == Some(&entry) {
        return Ok(None);
    }
    trace!(key = %key, known = model.is_some(), "merged change");
    snapshot.entries.insert(key.clone(), entry);
    Ok(Some(key))
}

/// Snapshot shared between a bridge and its readers.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<ModelSnapshot>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ModelSnapshot> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("model snapshot lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ModelSnapshot> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("model snapshot lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    pub fn get(&self, key: &Key) -> Option<RecallModel> {
        self.read().get(key)
    }

    pub fn models_for(&self, keys: &[Key]) -> Vec<(Key, Option<RecallModel>)> {
        self.read().models_for(keys)
    }
}
