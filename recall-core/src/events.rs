//! Observable study events.
//!
//! The session and the review applicator report what they do as a stream of
//! [`StudyEvent`]s so a host can render progress, keep a log, or export a
//! session for analysis. Events are filtered by [`Verbosity`] at the emitter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::recall::ReviewResult;

/// Types of study events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyEventType {
    /// Session entered the selecting state
    SessionStart,
    /// A quiz was shown
    Presented,
    /// An answer was graded locally
    Graded,
    /// A model was updated by a review (active or passive)
    Reviewed,
    /// A key was learned
    Learned,
    /// A key was unlearned
    Unlearned,
    /// A change notification was merged into the snapshot
    Synced,
    /// Session returned to idle
    SessionEnd,
    /// Operation failed
    Error,
}

impl std::fmt::Display for StudyEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SessionStart => "SESSION_START",
            Self::Presented => "PRESENTED",
            Self::Graded => "GRADED",
            Self::Reviewed => "REVIEWED",
            Self::Learned => "LEARNED",
            Self::Unlearned => "UNLEARNED",
            Self::Synced => "SYNCED",
            Self::SessionEnd => "SESSION_END",
            Self::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

impl StudyEventType {
    /// Lowest verbosity at which this event is emitted.
    pub fn min_verbosity(&self) -> Verbosity {
        match self {
            Self::Error | Self::Graded => Verbosity::Minimal,
            Self::SessionStart
            | Self::SessionEnd
            | Self::Presented
            | Self::Learned
            | Self::Unlearned => Verbosity::Normal,
            Self::Reviewed => Verbosity::Verbose,
            Self::Synced => Verbosity::Debug,
        }
    }

    pub fn should_emit(&self, verbosity: Verbosity) -> bool {
        self.min_verbosity() <= verbosity
    }
}

/// A study event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyEvent {
    pub event_type: StudyEventType,
    /// Model key the event concerns, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Human-readable description
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl StudyEvent {
    pub fn new(
        event_type: StudyEventType,
        key: Option<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            key,
            content: content.into(),
            metadata: None,
            timestamp,
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get a metadata value.
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref()?.get(key)
    }

    pub fn session_start(at: DateTime<Utc>) -> Self {
        Self::new(StudyEventType::SessionStart, None, "session started", at)
    }

    pub fn session_end(at: DateTime<Utc>) -> Self {
        Self::new(StudyEventType::SessionEnd, None, "session ended", at)
    }

    pub fn presented(key: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Presented,
            Some(key.to_string()),
            format!("presenting {key}"),
            at,
        )
    }

    pub fn graded(key: &str, result: ReviewResult, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Graded,
            Some(key.to_string()),
            format!("{key}: {result:?}"),
            at,
        )
        .with_metadata("success", result.is_success())
    }

    /// A model update written by the review applicator.
    pub fn reviewed(
        key: &str,
        active: bool,
        result: ReviewResult,
        recall_before: f64,
        at: DateTime<Utc>,
    ) -> Self {
        let kind = if active { "active" } else { "passive" };
        Self::new(
            StudyEventType::Reviewed,
            Some(key.to_string()),
            format!("{kind} review of {key}"),
            at,
        )
        .with_metadata("active", active)
        .with_metadata("success", result.is_success())
        .with_metadata("recall_before", recall_before)
    }

    pub fn learned(key: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Learned,
            Some(key.to_string()),
            format!("learned {key}"),
            at,
        )
    }

    pub fn unlearned(key: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Unlearned,
            Some(key.to_string()),
            format!("unlearned {key}"),
            at,
        )
    }

    pub fn synced(key: &str, deleted: bool, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Synced,
            Some(key.to_string()),
            format!("change for {key}"),
            at,
        )
        .with_metadata("deleted", deleted)
    }

    pub fn error(key: Option<&str>, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(
            StudyEventType::Error,
            key.map(str::to_string),
            error,
            at,
        )
    }

    pub fn is_error(&self) -> bool {
        self.event_type == StudyEventType::Error
    }

    /// Format as a single log line.
    pub fn as_log_line(&self) -> String {
        match &self.key {
            Some(key) => format!(
                "[{}] {} {}: {}",
                self.timestamp.format("%H:%M:%S"),
                self.event_type,
                key,
                self.content
            ),
            None => format!(
                "[{}] {}: {}",
                self.timestamp.format("%H:%M:%S"),
                self.event_type,
                self.content
            ),
        }
    }
}

/// Verbosity level for study events.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Only errors and grades
    Minimal,
    /// Session flow
    #[default]
    Normal,
    /// Every model update, passive ones included
    Verbose,
    /// Sync traffic too
    Debug,
}

/// Receiver of study events.
pub trait ReviewEmitter: Send + Sync {
    /// Emit a study event.
    fn emit(&self, event: StudyEvent);

    /// Lowest verbosity of events this emitter passes on. Fixed at construction.
    fn verbosity(&self) -> Verbosity;
}

/// Broadcast-based emitter.
pub struct BroadcastEmitter {
    sender: broadcast::Sender<StudyEvent>,
    verbosity: Verbosity,
}

impl BroadcastEmitter {
    /// Emitter whose channel buffers up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            verbosity: Verbosity::default(),
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Subscribe to study events.
    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ReviewEmitter for BroadcastEmitter {
    fn emit(&self, event: StudyEvent) {
        if event.event_type.should_emit(self.verbosity) {
            // No receivers is fine.
            let _ = self.sender.send(event);
        }
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

/// Emitter that keeps events in memory.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    events: Arc<RwLock<Vec<StudyEvent>>>,
    verbosity: Verbosity,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<StudyEvent> {
        match self.events.read() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Collected events of one type.
    pub fn events_of(&self, event_type: StudyEventType) -> Vec<StudyEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn clear(&self) {
        match self.events.write() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ReviewEmitter for CollectingEmitter {
    fn emit(&self, event: StudyEvent) {
        if !event.event_type.should_emit(self.verbosity) {
            return;
        }
        match self.events.write() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

/// Emitter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl ReviewEmitter for NullEmitter {
    fn emit(&self, _event: StudyEvent) {}
    fn verbosity(&self) -> Verbosity {
        Verbosity::Minimal
    }
}
