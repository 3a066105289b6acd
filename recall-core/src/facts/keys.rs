//! Stable identity keys for reviewable units.
//!
//! Every key is a `/`-separated path under the `model` namespace. The first
//! two segments name the root (a sentence or a vocab item); everything under
//! the same root is reviewed together, so a root-prefixed range scan returns
//! all sibling keys of a fact.

use serde::{Deserialize, Serialize};

use super::types::Fact;
use crate::error::{Error, Result};

/// Key path separator.
pub const SEPARATOR: char = '/';

/// Namespace of recall model documents.
pub const MODEL_PREFIX: &str = "model";

/// Namespace of quiz event documents.
pub const QUIZ_PREFIX: &str = "quiz";

/// Upper sentinel for prefix range scans.
pub const RANGE_END: char = '\u{FFFF}';

/// Which aspect of a fact a key reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Meaning,
    Reading,
    Conjugated,
    Particle,
}

impl Aspect {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Meaning => "meaning",
            Self::Reading => "reading",
            Self::Conjugated => "conjugated",
            Self::Particle => "particle",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "meaning" => Some(Self::Meaning),
            "reading" => Some(Self::Reading),
            "conjugated" => Some(Self::Conjugated),
            "particle" => Some(Self::Particle),
            _ => None,
        }
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one reviewable aspect of one fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wrap an existing key string (e.g. one read back from the store).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    fn under(root: &str, aspect: Aspect) -> Self {
        Self(format!("{root}{SEPARATOR}{aspect}"))
    }

    fn with_detail(root: &str, aspect: Aspect, detail: &str) -> Self {
        Self(format!("{root}{SEPARATOR}{aspect}{SEPARATOR}{detail}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two path segments, e.g. `model/猫が好き`.
    pub fn root(&self) -> &str {
        match self.0.match_indices(SEPARATOR).nth(1) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// The meaning key of this key's root. For particle and conjugated keys
    /// this is the enclosing sentence.
    pub fn parent_meaning(&self) -> Key {
        Key::under(self.root(), Aspect::Meaning)
    }

    /// Third path segment, if it names a known aspect.
    pub fn aspect(&self) -> Option<Aspect> {
        self.0.split(SEPARATOR).nth(2).and_then(Aspect::parse)
    }

    /// Whether this key lives in the model namespace.
    pub fn is_model_key(&self) -> bool {
        self.0
            .strip_prefix(MODEL_PREFIX)
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Inclusive-exclusive bounds covering every key nested under `root`.
pub fn related_range(root: &str) -> (String, String) {
    (
        format!("{root}{SEPARATOR}"),
        format!("{root}{SEPARATOR}{RANGE_END}"),
    )
}

/// Whether `c` is an ideographic (kanji) character.
pub fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{3005}'                      // 々
        | '\u{3400}'..='\u{4DBF}'       // Extension A
        | '\u{4E00}'..='\u{9FFF}'       // Unified Ideographs
        | '\u{F900}'..='\u{FAFF}'       // Compatibility Ideographs
        | '\u{20000}'..='\u{2A6DF}'     // Extension B
        | '\u{2A700}'..='\u{2EBEF}'     // Extensions C-F
    )
}

/// Whether `text` contains at least one ideographic character.
pub fn has_ideograph(text: &str) -> bool {
    text.chars().any(is_ideograph)
}

fn root_for(text: &str) -> Result<String> {
    if text.contains(SEPARATOR) {
        return Err(Error::construction(format!(
            "{text:?} contains the key separator {SEPARATOR:?}"
        )));
    }
    Ok(format!("{MODEL_PREFIX}{SEPARATOR}{text}"))
}

fn meaning_and_reading(text: &str) -> Result<Vec<Key>> {
    let root = root_for(text)?;
    let mut keys = vec![Key::under(&root, Aspect::Meaning)];
    if has_ideograph(text) {
        keys.push(Key::under(&root, Aspect::Reading));
    }
    Ok(keys)
}

fn parent_root(parent: Option<&str>, fact: &Fact) -> Result<String> {
    let parent = parent.ok_or_else(|| {
        Error::construction(format!("{} fact needs its parent sentence text", fact.kind()))
    })?;
    root_for(parent)
}

/// Derive the keys of one fact.
///
/// `parent` is the plain text of the enclosing sentence; it is required for
/// particle and conjugated facts and ignored otherwise.
pub fn derive_keys(fact: &Fact, parent: Option<&str>) -> Result<Vec<Key>> {
    match fact {
        Fact::Sentence(sentence) => meaning_and_reading(&sentence.plain_text()),
        Fact::Vocab(vocab) => meaning_and_reading(&vocab.joined_forms()),
        Fact::Conjugated(conj) => {
            let root = parent_root(parent, fact)?;
            Ok(vec![Key::with_detail(
                &root,
                Aspect::Conjugated,
                &conj.expected.plain_text(),
            )])
        }
        Fact::Particle(particle) => {
            let root = parent_root(parent, fact)?;
            let detail = format!("{}_{}_{}", particle.left, particle.cloze, particle.right);
            Ok(vec![Key::with_detail(&root, Aspect::Particle, &detail)])
        }
    }
}
