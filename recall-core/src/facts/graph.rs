//! In-memory mapping from keys to fact content.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::keys::{derive_keys, Key};
use super::types::{Fact, Sentence};
use crate::error::{Error, Result};

/// Keys and facts of one parsed document.
///
/// Built once per parse and never mutated by review activity. Keys keep the
/// order in which they were first derived, which is the order the scheduler
/// breaks ties in.
#[derive(Debug, Default, Clone)]
pub struct FactGraph {
    facts: HashMap<Key, Arc<Fact>>,
    order: Vec<Key>,
}

impl FactGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from the sentences of a document.
    ///
    /// A vocab item shared by several sentences keeps the first occurrence.
    pub fn build(sentences: impl IntoIterator<Item = Sentence>) -> Result<Self> {
        let mut graph = Self::new();
        for sentence in sentences {
            graph.add_sentence(sentence)?;
        }
        debug!(keys = graph.len(), "built fact graph");
        Ok(graph)
    }

    /// Add one sentence and all its sub-facts.
    pub fn add_sentence(&mut self, sentence: Sentence) -> Result<()> {
        let text = sentence.plain_text();
        let children = sentence.children.clone();

        let fact = Arc::new(Fact::Sentence(sentence));
        for key in derive_keys(&fact, None)? {
            self.insert(key, Arc::clone(&fact));
        }

        for child in children {
            let fact = Arc::new(Fact::from(child));
            for key in derive_keys(&fact, Some(&text))? {
                self.insert(key, Arc::clone(&fact));
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: Key, fact: Arc<Fact>) {
        if !self.facts.contains_key(&key) {
            self.order.push(key.clone());
            self.facts.insert(key, fact);
        }
    }

    /// All keys in derivation order.
    pub fn keys(&self) -> &[Key] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.facts.contains_key(key)
    }

    /// The fact a key reviews.
    pub fn get(&self, key: &Key) -> Option<&Arc<Fact>> {
        self.facts.get(key)
    }

    /// The fact a key reviews, or `UnknownKey`.
    pub fn fact(&self, key: &Key) -> Result<Arc<Fact>> {
        self.facts
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    /// The enclosing sentence of a particle or conjugated key.
    ///
    /// Resolved by truncating the key to its root and looking up the root's
    /// meaning key. Every sub-fact key is derived under a sentence, so a miss
    /// means the graph is inconsistent.
    pub fn parent_sentence(&self, key: &Key) -> Result<Arc<Fact>> {
        let parent_key = key.parent_meaning();
        match self.facts.get(&parent_key) {
            Some(fact) if fact.as_sentence().is_some() => Ok(Arc::clone(fact)),
            _ => Err(Error::MissingParent(key.to_string())),
        }
    }

    /// The fact for `key` plus its parent sentence when the fact needs one.
    pub fn resolve(&self, key: &Key) -> Result<(Arc<Fact>, Option<Arc<Fact>>)> {
        let fact = self.fact(key)?;
        let parent = if fact.needs_parent() {
            Some(self.parent_sentence(key)?)
        } else {
            None
        };
        Ok((fact, parent))
    }
}
