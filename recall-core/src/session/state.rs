//! Session states and transitions.

use std::sync::Arc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::facts::{Fact, FactGraph, Key};

/// Where a study session is.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for the scheduler.
    Selecting,
    /// A quiz is on screen.
    Presenting {
        key: Key,
        fact: Arc<Fact>,
        parent: Option<Arc<Fact>>,
    },
    /// A failed answer is being shown with its correction.
    Feedback {
        key: Key,
        fact: Arc<Fact>,
        parent: Option<Arc<Fact>>,
        response: Option<String>,
    },
}

/// Input to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    StartSession,
    /// Scheduler outcome; `None` when nothing is due.
    Selected(Option<Key>),
    SubmitSuccess,
    SubmitFailure(Option<String>),
    EndSession,
}

impl SessionAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartSession => "start_session",
            Self::Selected(_) => "selected",
            Self::SubmitSuccess => "submit_success",
            Self::SubmitFailure(_) => "submit_failure",
            Self::EndSession => "end_session",
        }
    }
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Presenting { .. } => "presenting",
            Self::Feedback { .. } => "feedback",
        }
    }

    /// Key on screen, if any.
    pub fn active_key(&self) -> Option<&Key> {
        match self {
            Self::Presenting { key, .. } | Self::Feedback { key, .. } => Some(key),
            Self::Idle | Self::Selecting => None,
        }
    }

    /// Next state after `action`.
    ///
    /// Leaving `Selecting` with a key resolves its fact (and parent sentence
    /// for particle and conjugation facts) from `graph`.
    pub fn transition(&self, action: SessionAction, graph: &FactGraph) -> Result<SessionState> {
        let next = match (self, action) {
            (Self::Idle, SessionAction::StartSession) => Self::Selecting,

            (Self::Selecting, SessionAction::Selected(Some(key))) => {
                let (fact, parent) = graph.resolve(&key)?;
                Self::Presenting { key, fact, parent }
            }
            (Self::Selecting, SessionAction::Selected(None)) => Self::Idle,

            (Self::Presenting { key, fact, parent }, SessionAction::SubmitFailure(response)) => {
                Self::Feedback {
                    key: key.clone(),
                    fact: Arc::clone(fact),
                    parent: parent.clone(),
                    response,
                }
            }
            (Self::Presenting { .. }, SessionAction::SubmitSuccess) => Self::Selecting,
            (Self::Presenting { .. }, SessionAction::StartSession) => Self::Selecting,
            (Self::Presenting { .. }, SessionAction::EndSession) => Self::Idle,

            (Self::Feedback { .. }, SessionAction::StartSession) => Self::Selecting,
            (Self::Feedback { .. }, SessionAction::EndSession) => Self::Idle,

            (state, action) => {
                return Err(Error::invalid_transition(state.name(), action.name()));
            }
        };
        trace!(from = self.name(), to = next.name(), "session transition");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{Particle, RubyText, Sentence, SubFact, TextUnit};
    use std::collections::BTreeMap;

    fn graph() -> FactGraph {
        let sentence = Sentence::new(
            RubyText::new(vec![TextUnit::ruby("私", "わたし"), "は学生です".into()]),
            vec![SubFact::Particle(Particle::new("私", "は", "学生"))],
            BTreeMap::new(),
        )
        .unwrap();
        FactGraph::build(vec![sentence]).unwrap()
    }

    fn particle_key() -> Key {
        Key::from_raw("model/私は学生です/particle/私_は_学生")
    }

    fn presenting(graph: &FactGraph) -> SessionState {
        SessionState::Selecting
            .transition(SessionAction::Selected(Some(particle_key())), graph)
            .unwrap()
    }

    fn all_actions() -> Vec<SessionAction> {
        vec![
            SessionAction::StartSession,
            SessionAction::Selected(Some(particle_key())),
            SessionAction::Selected(None),
            SessionAction::SubmitSuccess,
            SessionAction::SubmitFailure(Some("が".into())),
            SessionAction::EndSession,
        ]
    }

    #[test]
    fn test_selection_resolves_parent() {
        let graph = graph();
        match presenting(&graph) {
            SessionState::Presenting { key, fact, parent } => {
                assert_eq!(key, particle_key());
                assert!(fact.needs_parent());
                assert_eq!(
                    parent.unwrap().as_sentence().unwrap().plain_text(),
                    "私は学生です"
                );
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_failure_then_feedback_then_restart() {
        let graph = graph();
        let feedback = presenting(&graph)
            .transition(SessionAction::SubmitFailure(Some("が".into())), &graph)
            .unwrap();
        assert_eq!(feedback.name(), "feedback");
        assert_eq!(feedback.active_key(), Some(&particle_key()));

        let next = feedback
            .transition(SessionAction::StartSession, &graph)
            .unwrap();
        assert_eq!(next, SessionState::Selecting);
    }

    #[test]
    fn test_transition_table_is_total() {
        let graph = graph();
        let states = vec![
            SessionState::Idle,
            SessionState::Selecting,
            presenting(&graph),
            presenting(&graph)
                .transition(SessionAction::SubmitFailure(None), &graph)
                .unwrap(),
        ];
        let allowed = [
            ("idle", "start_session", "selecting"),
            ("selecting", "selected", "presenting"),
            ("selecting", "selected", "idle"),
            ("presenting", "submit_failure", "feedback"),
            ("presenting", "submit_success", "selecting"),
            ("presenting", "start_session", "selecting"),
            ("presenting", "end_session", "idle"),
            ("feedback", "start_session", "selecting"),
            ("feedback", "end_session", "idle"),
        ];

        let mut seen = 0;
        for state in &states {
            for action in all_actions() {
                let name = action.name();
                match state.transition(action, &graph) {
                    Ok(next) => {
                        assert!(
                            allowed.contains(&(state.name(), name, next.name())),
                            "unexpected {} --{}--> {}",
                            state.name(),
                            name,
                            next.name()
                        );
                        seen += 1;
                    }
                    Err(Error::InvalidTransition { state: s, action: a }) => {
                        assert_eq!(s, state.name());
                        assert_eq!(a, name);
                    }
                    Err(e) => panic!("unexpected error {e}"),
                }
            }
        }
        assert_eq!(seen, allowed.len());
    }

    #[test]
    fn test_unknown_key_fails_selection() {
        let graph = graph();
        let err = SessionState::Selecting
            .transition(
                SessionAction::Selected(Some(Key::from_raw("model/x/meaning"))),
                &graph,
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKey(_)));
    }
}
