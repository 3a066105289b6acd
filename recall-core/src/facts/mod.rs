//! Facts and their identity keys.
//!
//! A document is parsed (outside this crate) into [`Sentence`]s, each carrying
//! the vocab, particle, and conjugation facts found in it. This module turns
//! that content into stable [`Key`]s and a [`FactGraph`] the session uses to
//! look facts back up.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recall_core::facts::{derive_keys, Fact, RubyText, Sentence};
//!
//! let sentence = Sentence::new(RubyText::plain("猫が好き"), vec![], Default::default())?;
//! let keys = derive_keys(&Fact::Sentence(sentence), None)?;
//! assert_eq!(keys[0].as_str(), "model/猫が好き/meaning");
//! ```

mod graph;
mod keys;
mod types;

pub use graph::FactGraph;
pub use keys::{
    derive_keys, has_ideograph, is_ideograph, related_range, Aspect, Key, MODEL_PREFIX,
    QUIZ_PREFIX, RANGE_END, SEPARATOR,
};
pub use types::{
    Conjugated, Fact, FactKind, Particle, RubyText, Sentence, SubFact, TextUnit, Vocab,
};
