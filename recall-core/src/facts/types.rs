//! Fact content extracted from an annotated document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::keys::SEPARATOR;
use crate::error::{Error, Result};

/// One unit of annotated text: either plain text or a ruby (furigana) span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextUnit {
    /// Plain text, read as written
    Plain(String),
    /// Base text with its reading annotation
    Ruby { base: String, reading: String },
}

impl TextUnit {
    /// Create a ruby unit.
    pub fn ruby(base: impl Into<String>, reading: impl Into<String>) -> Self {
        Self::Ruby {
            base: base.into(),
            reading: reading.into(),
        }
    }
}

impl From<&str> for TextUnit {
    fn from(s: &str) -> Self {
        Self::Plain(s.to_string())
    }
}

/// A sequence of text units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RubyText(pub Vec<TextUnit>);

impl RubyText {
    /// Create from units.
    pub fn new(units: Vec<TextUnit>) -> Self {
        Self(units)
    }

    /// Create from a single plain string.
    pub fn plain(text: impl Into<String>) -> Self {
        Self(vec![TextUnit::Plain(text.into())])
    }

    /// Text as displayed, with ruby readings dropped.
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .map(|unit| match unit {
                TextUnit::Plain(s) => s.as_str(),
                TextUnit::Ruby { base, .. } => base.as_str(),
            })
            .collect()
    }

    /// Text as read aloud, with ruby bases replaced by their readings.
    pub fn reading_text(&self) -> String {
        self.0
            .iter()
            .map(|unit| match unit {
                TextUnit::Plain(s) => s.as_str(),
                TextUnit::Ruby { reading, .. } => reading.as_str(),
            })
            .collect()
    }

    /// Units in order.
    pub fn units(&self) -> &[TextUnit] {
        &self.0
    }
}

impl From<Vec<TextUnit>> for RubyText {
    fn from(units: Vec<TextUnit>) -> Self {
        Self(units)
    }
}

/// A vocabulary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocab {
    /// Surface forms (kanji/kana alternatives), in order.
    pub forms: Vec<RubyText>,
    /// Definition shown with the item.
    pub definition: String,
}

impl Vocab {
    /// Separator placed between surface forms in keys and prompts.
    pub const FORM_JOINER: &'static str = "・";

    /// Create a vocab item, rejecting forms that would break key paths.
    pub fn new(forms: Vec<RubyText>, definition: impl Into<String>) -> Result<Self> {
        if forms.is_empty() {
            return Err(Error::construction("vocab needs at least one surface form"));
        }
        let vocab = Self {
            forms,
            definition: definition.into(),
        };
        let joined = vocab.joined_forms();
        if joined.contains(SEPARATOR) {
            return Err(Error::construction(format!(
                "vocab {joined:?} contains the key separator {SEPARATOR:?}"
            )));
        }
        Ok(vocab)
    }

    /// Plain text of all forms joined with `・`.
    pub fn joined_forms(&self) -> String {
        self.forms
            .iter()
            .map(RubyText::plain_text)
            .collect::<Vec<_>>()
            .join(Self::FORM_JOINER)
    }

    /// Readings accepted for this item, one per form, deduplicated.
    pub fn readings(&self) -> Vec<String> {
        let mut readings: Vec<String> = Vec::new();
        for form in &self.forms {
            let reading = form.reading_text();
            if !readings.contains(&reading) {
                readings.push(reading);
            }
        }
        readings
    }
}

/// A particle cloze inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Particle {
    pub left: String,
    pub cloze: String,
    pub right: String,
}

impl Particle {
    pub fn new(
        left: impl Into<String>,
        cloze: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            cloze: cloze.into(),
            right: right.into(),
        }
    }
}

/// A conjugated phrase inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conjugated {
    /// The surface text the learner must produce.
    pub expected: RubyText,
    /// Hint shown in place of the blank, same shape as `expected`.
    pub hint: RubyText,
}

impl Conjugated {
    pub fn new(expected: impl Into<RubyText>, hint: impl Into<RubyText>) -> Self {
        Self {
            expected: expected.into(),
            hint: hint.into(),
        }
    }
}

/// A fact nested in a sentence. Sentences never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubFact {
    Vocab(Vocab),
    Particle(Particle),
    Conjugated(Conjugated),
}

impl From<SubFact> for Fact {
    fn from(sub: SubFact) -> Self {
        match sub {
            SubFact::Vocab(v) => Fact::Vocab(v),
            SubFact::Particle(p) => Fact::Particle(p),
            SubFact::Conjugated(c) => Fact::Conjugated(c),
        }
    }
}

/// An annotated sentence and the facts extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: RubyText,
    pub children: Vec<SubFact>,
    /// Translations keyed by language code.
    pub translations: BTreeMap<String, String>,
}

impl Sentence {
    /// Create a sentence, rejecting text that contains the key separator.
    pub fn new(
        text: impl Into<RubyText>,
        children: Vec<SubFact>,
        translations: BTreeMap<String, String>,
    ) -> Result<Self> {
        let text = text.into();
        let plain = text.plain_text();
        if plain.contains(SEPARATOR) {
            return Err(Error::construction(format!(
                "sentence {plain:?} contains the key separator {SEPARATOR:?}"
            )));
        }
        Ok(Self {
            text,
            children,
            translations,
        })
    }

    /// Add a translation.
    pub fn with_translation(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.translations.insert(lang.into(), text.into());
        self
    }

    pub fn plain_text(&self) -> String {
        self.text.plain_text()
    }

    pub fn reading_text(&self) -> String {
        self.text.reading_text()
    }
}

/// Discriminant of [`Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Vocab,
    Particle,
    Conjugated,
    Sentence,
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vocab => write!(f, "vocab"),
            Self::Particle => write!(f, "particle"),
            Self::Conjugated => write!(f, "conjugated"),
            Self::Sentence => write!(f, "sentence"),
        }
    }
}

/// One reviewable unit of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fact {
    Vocab(Vocab),
    Particle(Particle),
    Conjugated(Conjugated),
    Sentence(Sentence),
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Self::Vocab(_) => FactKind::Vocab,
            Self::Particle(_) => FactKind::Particle,
            Self::Conjugated(_) => FactKind::Conjugated,
            Self::Sentence(_) => FactKind::Sentence,
        }
    }

    pub fn as_sentence(&self) -> Option<&Sentence> {
        match self {
            Self::Sentence(s) => Some(s),
            _ => None,
        }
    }

    /// Whether quizzing this fact needs the enclosing sentence.
    pub fn needs_parent(&self) -> bool {
        matches!(self, Self::Particle(_) | Self::Conjugated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neko() -> RubyText {
        RubyText::new(vec![TextUnit::ruby("猫", "ねこ"), "が好き".into()])
    }

    #[test]
    fn test_plain_and_reading_text() {
        let text = neko();
        assert_eq!(text.plain_text(), "猫が好き");
        assert_eq!(text.reading_text(), "ねこが好き");
    }

    #[test]
    fn test_sentence_rejects_separator() {
        let err = Sentence::new(RubyText::plain("and/or"), vec![], BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn test_vocab_rejects_separator_and_empty() {
        assert!(Vocab::new(vec![RubyText::plain("a/b")], "x").is_err());
        assert!(Vocab::new(vec![], "x").is_err());
    }

    #[test]
    fn test_vocab_joined_forms_and_readings() {
        let vocab = Vocab::new(
            vec![
                RubyText::new(vec![TextUnit::ruby("猫", "ねこ")]),
                RubyText::plain("ねこ"),
            ],
            "cat",
        )
        .unwrap();
        assert_eq!(vocab.joined_forms(), "猫・ねこ");
        assert_eq!(vocab.readings(), vec!["ねこ".to_string()]);
    }

    #[test]
    fn test_fact_kind_and_parent_need() {
        let particle = Fact::Particle(Particle::new("私", "は", "学生"));
        assert_eq!(particle.kind(), FactKind::Particle);
        assert!(particle.needs_parent());

        let sentence = Fact::Sentence(Sentence::new(neko(), vec![], BTreeMap::new()).unwrap());
        assert!(!sentence.needs_parent());
        assert!(sentence.as_sentence().is_some());
    }

    #[test]
    fn test_fact_serde_is_tagged() {
        let fact = Fact::Particle(Particle::new("私", "は", "学生"));
        let json = serde_json::to_value(&fact).unwrap();
        assert_eq!(json["kind"], "particle");
        let back: Fact = serde_json::from_value(json).unwrap();
        assert_eq!(back, fact);
    }
}
