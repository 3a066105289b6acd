//! Error types for recall-core.

use thiserror::Error;

/// Result type alias using recall-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving keys, scheduling, or reviewing.
#[derive(Error, Debug)]
pub enum Error {
    /// Fact content that cannot produce valid keys
    #[error("Invalid fact content: {0}")]
    Construction(String),

    /// Action submitted in a state that does not accept it
    #[error("Invalid session transition: {action} while {state}")]
    InvalidTransition { state: String, action: String },

    /// Particle/conjugated key without a sentence in the fact graph
    #[error("No parent sentence for key {0}")]
    MissingParent(String),

    /// Key not present in the fact graph
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// Review requested for a key that has never been learned
    #[error("Key has not been learned: {0}")]
    NotLearned(String),

    /// Answer kind does not fit the quiz
    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    /// Numerical failure inside the recall model
    #[error("Recall model error: {0}")]
    Model(String),

    /// External store failure
    #[error("Store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Append-only write hit an existing key
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a store error with source.
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(state: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            action: action.into(),
        }
    }

    /// Create a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Create a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::store_with_source(format!("sqlite: {err}"), err)
    }
}
