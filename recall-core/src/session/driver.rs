//! A study session over one document.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::quiz::{Answer, Quiz};
use super::state::{SessionAction, SessionState};
use crate::bridge::{SharedSnapshot, SyncBridge};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::{BroadcastEmitter, ReviewEmitter, StudyEvent};
use crate::facts::{FactGraph, Key};
use crate::recall::{RecallModel, ReviewResult};
use crate::review::{ReviewApplicator, ReviewOutcome};
use crate::scheduler::{rank, select_next};
use crate::store::ExternalStore;

/// Builder for [`StudySession`].
pub struct SessionBuilder {
    graph: FactGraph,
    store: Arc<dyn ExternalStore>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    emitter: Option<Arc<dyn ReviewEmitter>>,
}

impl SessionBuilder {
    pub fn new(graph: FactGraph, store: Arc<dyn ExternalStore>) -> Self {
        Self {
            graph,
            store,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            emitter: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observer for study events. Defaults to a broadcast emitter sized and
    /// filtered by the session config, reachable through [`StudySession::subscribe`].
    pub fn emitter(mut self, emitter: Arc<dyn ReviewEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Validate the config, subscribe to the graph's keys and load their models.
    pub async fn open(self) -> Result<StudySession> {
        self.config.validate()?;
        let (emitter, broadcast) = match self.emitter {
            Some(emitter) => (emitter, None),
            None => {
                let broadcast = Arc::new(
                    BroadcastEmitter::new(self.config.session.event_capacity)
                        .with_verbosity(self.config.session.verbosity),
                );
                (broadcast.clone() as Arc<dyn ReviewEmitter>, Some(broadcast))
            }
        };

        let keys = self.graph.keys().to_vec();
        let bridge = SyncBridge::connect(Arc::clone(&self.store), keys, SharedSnapshot::new())
            .await?
            .with_emitter(Arc::clone(&emitter));
        let applicator = ReviewApplicator::new(self.store, self.config.recall.clone())
            .with_emitter(Arc::clone(&emitter));

        info!(keys = self.graph.len(), "study session opened");
        Ok(StudySession {
            graph: self.graph,
            applicator,
            bridge,
            clock: self.clock,
            emitter,
            broadcast,
            state: SessionState::Idle,
            quiz: None,
        })
    }
}

/// Drives the session state machine against live models.
///
/// Scheduling reads the bridge's snapshot; reviews go through the
/// applicator and are mirrored into the snapshot as provisional until the
/// store's notification confirms them.
pub struct StudySession {
    graph: FactGraph,
    applicator: ReviewApplicator,
    bridge: SyncBridge,
    clock: Arc<dyn Clock>,
    emitter: Arc<dyn ReviewEmitter>,
    /// Set when no emitter was supplied and the default broadcast one is used.
    broadcast: Option<Arc<BroadcastEmitter>>,
    state: SessionState,
    quiz: Option<Quiz>,
}

impl StudySession {
    pub fn builder(graph: FactGraph, store: Arc<dyn ExternalStore>) -> SessionBuilder {
        SessionBuilder::new(graph, store)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Quiz on screen while presenting or showing feedback.
    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn graph(&self) -> &FactGraph {
        &self.graph
    }

    pub fn snapshot(&self) -> &SharedSnapshot {
        self.bridge.snapshot()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Receive study events from the default broadcast emitter.
    ///
    /// `None` when the session was built with its own emitter.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<StudyEvent>> {
        self.broadcast.as_ref().map(|emitter| emitter.subscribe())
    }

    fn step(&mut self, action: SessionAction) -> Result<()> {
        let next = self.state.transition(action, &self.graph)?;
        self.state = next;
        Ok(())
    }

    /// Merge queued store notifications into the snapshot.
    pub async fn sync(&mut self) -> Result<Vec<Key>> {
        let now = self.clock.now();
        self.bridge.pump(now).await
    }

    /// Learned keys of this document, most urgent first.
    pub fn due(&self) -> Vec<(Key, f64)> {
        let models = self.bridge.snapshot().models_for(self.graph.keys());
        rank(&models, self.clock.now())
            .into_iter()
            .map(|(key, recall)| (key.clone(), recall))
            .collect()
    }

    /// Start (or restart) and move to the most urgent quiz.
    ///
    /// Ends in `Presenting`, or `Idle` when nothing is learned.
    pub async fn start(&mut self) -> Result<&SessionState> {
        let now = self.clock.now();
        self.step(SessionAction::StartSession)?;
        self.emitter.emit(StudyEvent::session_start(now));
        self.select().await?;
        Ok(&self.state)
    }

    async fn select(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.bridge.pump(now).await?;

        let models = self.bridge.snapshot().models_for(self.graph.keys());
        let next = select_next(&models, now);
        self.step(SessionAction::Selected(next))?;

        match &self.state {
            SessionState::Presenting { key, fact, parent } => {
                let quiz = Quiz::build(key, fact, parent.as_deref())?;
                debug!(key = %key, "presenting");
                self.emitter.emit(StudyEvent::presented(key.as_str(), now));
                self.quiz = Some(quiz);
            }
            _ => {
                debug!("nothing to review");
                self.quiz = None;
                self.emitter.emit(StudyEvent::session_end(now));
            }
        }
        Ok(())
    }

    /// Grade and record an answer to the current quiz.
    ///
    /// On success the session moves straight on to the next quiz; on failure
    /// it shows feedback. If grading or any store write fails, the state is
    /// left as it was.
    pub async fn answer(&mut self, answer: Answer) -> Result<ReviewResult> {
        let key = match &self.state {
            SessionState::Presenting { key, .. } => key.clone(),
            state => return Err(Error::invalid_transition(state.name(), "answer")),
        };
        let quiz = self
            .quiz
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("presenting {key} without a quiz")))?;
        let result = quiz.grade(&answer)?;
        let now = self.clock.now();
        self.emitter.emit(StudyEvent::graded(key.as_str(), result, now));

        let response = match result {
            ReviewResult::Success => None,
            ReviewResult::Failure => answer.response(),
        };
        let outcome = match self
            .applicator
            .apply_review(&key, result, response.clone(), now)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(key = %key, error = %e, "review not recorded");
                self.emitter
                    .emit(StudyEvent::error(Some(key.as_str()), e.to_string(), now));
                return Err(e);
            }
        };
        self.apply_local(&outcome);

        match result {
            ReviewResult::Success => {
                self.step(SessionAction::SubmitSuccess)?;
                self.select().await?;
            }
            ReviewResult::Failure => {
                self.step(SessionAction::SubmitFailure(response))?;
            }
        }
        Ok(result)
    }

    fn apply_local(&self, outcome: &ReviewOutcome) {
        for (key, model) in &outcome.models {
            self.bridge.apply_local(key.clone(), Some(*model));
        }
    }

    /// Return to idle.
    pub fn end(&mut self) -> Result<()> {
        self.step(SessionAction::EndSession)?;
        self.quiz = None;
        self.emitter.emit(StudyEvent::session_end(self.clock.now()));
        Ok(())
    }

    /// Start tracking `key`. It must belong to this document.
    pub async fn learn(&mut self, key: &Key) -> Result<RecallModel> {
        if !self.graph.contains(key) {
            return Err(Error::UnknownKey(key.to_string()));
        }
        let model = self.applicator.learn(key, self.clock.now()).await?;
        self.bridge.apply_local(key.clone(), Some(model));
        Ok(model)
    }

    /// Learn every key of this document that is not learned yet.
    pub async fn learn_all(&mut self) -> Result<usize> {
        let keys: Vec<Key> = self
            .bridge
            .snapshot()
            .models_for(self.graph.keys())
            .into_iter()
            .filter(|(_, model)| model.is_none())
            .map(|(key, _)| key)
            .collect();
        for key in &keys {
            self.learn(key).await?;
        }
        Ok(keys.len())
    }

    /// Forget `key`. If it is on screen, the next `start` picks something else.
    pub async fn unlearn(&mut self, key: &Key) -> Result<()> {
        self.applicator.unlearn(key, self.clock.now()).await?;
        self.bridge.apply_local(key.clone(), None);
        Ok(())
    }

    /// Stop following store changes. The session can no longer be used.
    pub fn close(mut self) {
        self.bridge.release();
        info!("study session closed");
    }
}
