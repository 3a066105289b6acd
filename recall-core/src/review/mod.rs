//! Review application.
//!
//! A quiz touches every learned key of its sentence: the quizzed key gets a
//! Bayesian update, the others a passive refresh. Each change is written as
//! a model upsert plus an append-only [`QuizEvent`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use recall_core::review::ReviewApplicator;
//!
//! let applicator = ReviewApplicator::new(store, config.recall.clone());
//! applicator.learn(&key, now).await?;
//! let outcome = applicator.apply_review(&key, ReviewResult::Success, None, later).await?;
//! ```

mod applicator;
mod event;

pub use applicator::{ReviewApplicator, ReviewOutcome};
pub use event::{event_key, EventExtra, EventStrength, QuizEvent};
