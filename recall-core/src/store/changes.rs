//! Change notifications and subscriptions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{trace, warn};

use super::Document;

/// One change observed by the store, local or replicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub key: String,
    pub deleted: bool,
    /// Current document, absent for deletions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

impl ChangeNotification {
    pub fn updated(key: impl Into<String>, doc: Document) -> Self {
        Self {
            key: key.into(),
            deleted: false,
            doc: Some(doc),
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            deleted: true,
            doc: None,
        }
    }
}

/// Fan-out of change notifications to live subscriptions.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeNotification>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, change: ChangeNotification) {
        trace!(key = %change.key, deleted = change.deleted, "publishing change");
        // Nobody listening is fine.
        let _ = self.sender.send(change);
    }

    /// Subscribe from now on; `keys` restricts delivery to those keys.
    pub fn subscribe(&self, keys: Option<Vec<String>>) -> ChangeSubscription {
        ChangeSubscription {
            receiver: Some(self.sender.subscribe()),
            keys: keys.map(|keys| keys.into_iter().collect()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Changed(ChangeNotification),
    /// The subscriber fell behind and `skipped` notifications were dropped.
    /// Anything derived from the feed must be rebuilt from the store.
    Lagged(u64),
}

impl FeedItem {
    pub fn into_change(self) -> Option<ChangeNotification> {
        match self {
            Self::Changed(change) => Some(change),
            Self::Lagged(_) => None,
        }
    }

    pub fn is_lagged(&self) -> bool {
        matches!(self, Self::Lagged(_))
    }
}

/// Live stream of changes from subscription time on.
///
/// Dropping the subscription releases it. [`release`](Self::release) does the
/// same explicitly and may be called any number of times.
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: Option<broadcast::Receiver<ChangeNotification>>,
    keys: Option<HashSet<String>>,
}

impl ChangeSubscription {
    fn wants(&self, change: &ChangeNotification) -> bool {
        self.keys
            .as_ref()
            .map_or(true, |keys| keys.contains(&change.key))
    }

    /// Wait for the next matching change or lag marker. `None` once released
    /// or closed.
    pub async fn next(&mut self) -> Option<FeedItem> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(change) if self.wants(&change) => return Some(FeedItem::Changed(change)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscription lagged, notifications dropped");
                    return Some(FeedItem::Lagged(skipped));
                }
                Err(RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Next matching change or lag marker already queued, without waiting.
    pub fn try_next(&mut self) -> Option<FeedItem> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.try_recv() {
                Ok(change) if self.wants(&change) => return Some(FeedItem::Changed(change)),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscription lagged, notifications dropped");
                    return Some(FeedItem::Lagged(skipped));
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Drain everything queued.
    pub fn drain(&mut self) -> Vec<FeedItem> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Stop receiving. Idempotent.
    pub fn release(&mut self) {
        self.receiver = None;
    }

    pub fn is_released(&self) -> bool {
        self.receiver.is_none()
    }
}
