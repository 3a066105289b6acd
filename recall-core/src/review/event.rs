//! Append-only quiz event records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::facts::{Key, QUIZ_PREFIX, SEPARATOR};
use crate::recall::{RecallModel, ReviewResult, Strength, SCHEMA_VERSION};

/// Strength as stored in an event: `{a, b, t}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventStrength {
    pub a: f64,
    pub b: f64,
    pub t: f64,
}

impl From<Strength> for EventStrength {
    fn from(s: Strength) -> Self {
        Self {
            a: s.alpha,
            b: s.beta,
            t: s.half_life_hours,
        }
    }
}

/// Free-form extras attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Record of one model update caused by a quiz.
///
/// The active event is for the quizzed key. Passive events record siblings
/// whose `last_seen` moved because they were on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizEvent {
    pub schema_version: String,
    pub model_key: String,
    pub active: bool,
    pub timestamp: DateTime<Utc>,
    pub result: ReviewResult,
    pub new_strength: EventStrength,
    pub old_strength: EventStrength,
    /// Exposure time before this update.
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub extra: EventExtra,
}

impl QuizEvent {
    pub fn new(
        key: &Key,
        active: bool,
        result: ReviewResult,
        before: &RecallModel,
        after: &RecallModel,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            model_key: key.to_string(),
            active,
            timestamp,
            result,
            new_strength: after.strength.into(),
            old_strength: before.strength.into(),
            last_seen: before.last_seen,
            extra: EventExtra::default(),
        }
    }

    pub fn with_response(mut self, response: Option<String>) -> Self {
        self.extra.response = response;
        self
    }
}

/// Key for the `index`-th event written at `at`.
///
/// Keys sort by time; the random part keeps devices from colliding.
pub fn event_key(at: DateTime<Utc>, index: usize) -> String {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{QUIZ_PREFIX}{SEPARATOR}{stamp}-{}-{index}", &nonce[..8])
}
