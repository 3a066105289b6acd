//! Probabilistic memory model.
//!
//! Each learned key carries a [`RecallModel`]: a Beta belief over the chance
//! of recalling it at a reference time, plus when it was last seen. The
//! model predicts current recall and is updated by Bayesian inference on
//! each quiz outcome.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recall_core::recall::{initialize_model, update_model, ReviewResult};
//!
//! let model = initialize_model(now);
//! let later = now + chrono::Duration::hours(2);
//! let p = model.predict_recall(later);
//! let model = update_model(&model, ReviewResult::Success, 2.0, later)?;
//! ```

mod document;
pub mod math;
mod model;
mod proptest;

pub use document::{decode_model, encode_model, merge_model, ModelDocument};
pub use model::{
    initialize_model, predict, update_model, RecallModel, ReviewResult, Strength, SCHEMA_VERSION,
};
