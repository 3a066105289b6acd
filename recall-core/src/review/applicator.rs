//! Applying quiz outcomes to stored models.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::event::{event_key, QuizEvent};
use crate::config::RecallConfig;
use crate::error::{Error, Result};
use crate::events::{NullEmitter, ReviewEmitter, StudyEvent};
use crate::facts::{related_range, Key};
use crate::recall::{decode_model, merge_model, RecallModel, ReviewResult};
use crate::store::{merge_with, ExternalStore};

/// Models written and events recorded by one review.
///
/// The active key comes first in both lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub models: Vec<(Key, RecallModel)>,
    pub events: Vec<QuizEvent>,
}

impl ReviewOutcome {
    /// The quizzed key's event.
    pub fn active_event(&self) -> Option<&QuizEvent> {
        self.events.first()
    }
}

/// Writes review results, learns and unlearns keys.
pub struct ReviewApplicator {
    store: Arc<dyn ExternalStore>,
    emitter: Arc<dyn ReviewEmitter>,
    config: RecallConfig,
}

impl ReviewApplicator {
    pub fn new(store: Arc<dyn ExternalStore>, config: RecallConfig) -> Self {
        Self {
            store,
            emitter: Arc::new(NullEmitter),
            config,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn ReviewEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn store(&self) -> &Arc<dyn ExternalStore> {
        &self.store
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Learned siblings of `key` under its sentence root.
    ///
    /// Fails when `key` itself is unlearned or unreadable. Unreadable
    /// siblings are skipped.
    async fn learned_siblings(&self, key: &Key) -> Result<Vec<Key>> {
        let (start, end) = related_range(key.root());
        let mut learned = false;
        let mut siblings = Vec::new();
        for (raw, doc) in self.store.range(&start, &end).await? {
            let sibling = Key::from_raw(raw);
            if &sibling == key {
                learned = decode_model(&doc)?.is_some();
                continue;
            }
            match decode_model(&doc) {
                Ok(Some(_)) => siblings.push(sibling),
                Ok(None) => {}
                Err(e) => warn!(key = %sibling, error = %e, "skipping unreadable sibling"),
            }
        }
        if !learned {
            return Err(Error::NotLearned(key.to_string()));
        }
        Ok(siblings)
    }

    /// Read-modify-write one model document.
    ///
    /// `step` sees the model stored at write time and returns the new one,
    /// or `None` to leave the document alone. Returns the before/after pair
    /// when something was written.
    async fn rewrite_model<F>(
        &self,
        key: &Key,
        step: F,
    ) -> Result<Option<(RecallModel, RecallModel)>>
    where
        F: FnOnce(Result<Option<RecallModel>>) -> Result<Option<RecallModel>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.store
            .upsert(
                key.as_str(),
                merge_with(move |existing| {
                    let decoded = decode_model(&existing);
                    let before = decoded.as_ref().ok().copied().flatten();
                    match (before, step(decoded)?) {
                        (Some(before), Some(after)) => {
                            let _ = tx.send(Some((before, after)));
                            merge_model(existing, &after)
                        }
                        _ => {
                            let _ = tx.send(None);
                            Ok(existing)
                        }
                    }
                }),
            )
            .await?;
        rx.await
            .map_err(|_| Error::Internal(format!("store skipped the merge for {key}")))
    }

    /// Record a quiz of `key` answered at `now`.
    ///
    /// The quizzed key gets a Bayesian update. Every other learned key under
    /// the same sentence root was visible too, so its `last_seen` moves to
    /// `now` with strength unchanged. Both are computed from the document
    /// as it stands when it is written, so overlapping reviews do not undo
    /// each other and a sibling unlearned meanwhile stays unlearned.
    /// Nothing is reported as done unless every model and event write
    /// succeeded.
    #[instrument(skip_all, fields(key = %key, ?result))]
    pub async fn apply_review(
        &self,
        key: &Key,
        result: ReviewResult,
        response: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let siblings = self.learned_siblings(key).await?;

        let config = self.config.clone();
        let missing = key.to_string();
        let active = self.rewrite_model(key, move |decoded| match decoded? {
            Some(prior) => prior
                .update(result, prior.elapsed_hours(now), now, &config)
                .map(Some),
            None => Err(Error::NotLearned(missing)),
        });
        let refreshes = try_join_all(siblings.iter().map(|sibling| {
            self.rewrite_model(sibling, move |decoded| {
                Ok(decoded.ok().flatten().map(|model| model.refreshed(now)))
            })
        }));
        let (active, refreshes) = futures::try_join!(active, refreshes)?;

        let (prior, updated) = active
            .ok_or_else(|| Error::Internal(format!("review of {key} wrote no model")))?;
        debug!(
            elapsed = prior.elapsed_hours(now),
            recall_before = prior.predict_recall(now),
            "updated active model"
        );

        let mut changes = vec![(key.clone(), prior, updated, true)];
        for (sibling, change) in siblings.into_iter().zip(refreshes) {
            match change {
                Some((before, after)) => changes.push((sibling, before, after, false)),
                None => debug!(key = %sibling, "sibling gone before refresh"),
            }
        }

        let events: Vec<QuizEvent> = changes
            .iter()
            .map(|(k, before, after, active)| {
                let event = QuizEvent::new(k, *active, result, before, after, now);
                if *active {
                    event.with_response(response.clone())
                } else {
                    event
                }
            })
            .collect();

        let writes = events
            .iter()
            .enumerate()
            .map(|(index, event)| -> Result<_> {
                Ok((event_key(now, index), serde_json::to_value(event)?))
            })
            .collect::<Result<Vec<_>>>()?;
        try_join_all(
            writes
                .into_iter()
                .map(|(at_key, doc)| async move { self.store.put_new(&at_key, doc).await }),
        )
        .await?;

        for (k, before, _, active) in &changes {
            self.emitter.emit(StudyEvent::reviewed(
                k.as_str(),
                *active,
                result,
                before.predict_recall(now),
                now,
            ));
        }
        info!(updated = changes.len(), "review applied");

        Ok(ReviewOutcome {
            models: changes.into_iter().map(|(k, _, after, _)| (k, after)).collect(),
            events,
        })
    }

    /// Start tracking `key` with a fresh model. An existing model is kept.
    pub async fn learn(&self, key: &Key, now: DateTime<Utc>) -> Result<RecallModel> {
        let fresh = RecallModel::initial(&self.config, now);
        let doc = self
            .store
            .upsert(
                key.as_str(),
                merge_with(move |existing| match decode_model(&existing)? {
                    Some(_) => Ok(existing),
                    None => merge_model(existing, &fresh),
                }),
            )
            .await?;
        let model = decode_model(&doc)?
            .ok_or_else(|| Error::Internal(format!("learn left {key} without a model")))?;
        self.emitter.emit(StudyEvent::learned(key.as_str(), now));
        debug!(key = %key, "learned");
        Ok(model)
    }

    /// Forget `key`. Its next `learn` starts from the default prior.
    pub async fn unlearn(&self, key: &Key, now: DateTime<Utc>) -> Result<()> {
        self.store.delete(key.as_str()).await?;
        self.emitter.emit(StudyEvent::unlearned(key.as_str(), now));
        debug!(key = %key, "unlearned");
        Ok(())
    }

    /// Current models of `keys`, in the same order.
    pub async fn load_models(&self, keys: &[Key]) -> Result<Vec<(Key, Option<RecallModel>)>> {
        let docs = try_join_all(keys.iter().map(|k| self.store.get(k.as_str()))).await?;
        keys.iter()
            .zip(docs)
            .map(|(k, doc)| -> Result<(Key, Option<RecallModel>)> {
                let model = match doc {
                    Some(doc) => decode_model(&doc)?,
                    None => None,
                };
                Ok((k.clone(), model))
            })
            .collect()
    }
}
