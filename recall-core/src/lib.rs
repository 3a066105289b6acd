//! # recall-core
//!
//! Spaced-repetition engine for studying a document sentence by sentence.
//!
//! ## Core Components
//!
//! - **Facts**: Sentences and their sub-facts, with stable identity keys
//! - **Recall**: Bayesian model of how likely a fact is to be remembered
//! - **Scheduler**: Picks the learned fact most at risk of being forgotten
//! - **Session**: Quiz state machine, local grading, review recording
//! - **Store**: Replicated document store contract and two backends
//! - **Bridge**: Keeps the in-memory model snapshot in step with the store
//!
//! ## Example
//!
//! ```rust,ignore
//! use recall_core::{FactGraph, Sentence, RubyText, SqliteStore, StudySession};
//! use std::sync::Arc;
//!
//! let sentence = Sentence::new(RubyText::plain("猫が好き"), vec![], Default::default())?;
//! let graph = FactGraph::build(vec![sentence])?;
//! let store = Arc::new(SqliteStore::open("study.db")?);
//!
//! let mut session = StudySession::builder(graph, store).open().await?;
//! session.learn_all().await?;
//! session.start().await?;
//! ```

pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod facts;
pub mod recall;
pub mod review;
pub mod scheduler;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use bridge::{ModelSnapshot, SharedSnapshot, SyncBridge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, EngineConfigBuilder, RecallConfig, SessionConfig};
pub use error::{Error, Result};
pub use events::{
    BroadcastEmitter, CollectingEmitter, NullEmitter, ReviewEmitter, StudyEvent, StudyEventType,
    Verbosity,
};
pub use facts::{
    derive_keys, Aspect, Conjugated, Fact, FactGraph, FactKind, Key, Particle, RubyText, Sentence,
    SubFact, TextUnit, Vocab,
};
pub use recall::{initialize_model, predict, update_model, RecallModel, ReviewResult, Strength};
pub use review::{QuizEvent, ReviewApplicator, ReviewOutcome};
pub use scheduler::{rank, select_next};
pub use session::{Answer, Quiz, SessionAction, SessionBuilder, SessionState, StudySession};
pub use store::{
    ChangeNotification, ChangeSubscription, Document, ExternalStore, FeedItem, MemoryStore,
    SqliteStore,
};
