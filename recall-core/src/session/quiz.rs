//! Quiz payloads and local grading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::facts::{Aspect, Fact, Key, Sentence};
use crate::recall::ReviewResult;

/// Placeholder shown in place of the span to fill.
pub const BLANK: &str = "＿＿";

/// What the learner is asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quiz {
    /// Does the learner understand the sentence? Self-graded.
    Comprehension {
        sentence: String,
        translations: BTreeMap<String, String>,
    },
    /// Does the learner know what the word means? Self-graded.
    VocabMeaning { forms: String, definition: String },
    /// Type the reading of `prompt`.
    Reading {
        prompt: String,
        accepted: Vec<String>,
    },
    /// Fill the blanked conjugated phrase of the parent sentence.
    Conjugation {
        left: String,
        right: String,
        hint: String,
        expected: String,
    },
    /// Fill the blanked particle of the parent sentence.
    Particle {
        left: String,
        right: String,
        expected: String,
    },
}

/// A learner's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Self-assessment for binary quizzes.
    Binary(bool),
    /// Typed answer for reading and fill-in quizzes.
    Text(String),
}

impl Answer {
    /// Free text worth keeping with a failed review.
    pub fn response(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Binary(_) => None,
        }
    }
}

fn parent_sentence<'a>(key: &Key, parent: Option<&'a Fact>) -> Result<&'a Sentence> {
    parent
        .and_then(Fact::as_sentence)
        .ok_or_else(|| Error::MissingParent(key.to_string()))
}

/// Split `text` around `span`, taking the first place where `span` sits
/// between `before` and `after`.
fn blank_out(text: &str, before: &str, span: &str, after: &str) -> Result<(String, String)> {
    let context = format!("{before}{span}{after}");
    match text.find(&context) {
        Some(at) if !span.is_empty() => {
            let start = at + before.len();
            Ok((
                text[..start].to_string(),
                text[start + span.len()..].to_string(),
            ))
        }
        _ => Err(Error::construction(format!("{context:?} does not occur in {text:?}"))),
    }
}

impl Quiz {
    /// Payload for `key`, whose fact (and parent sentence) came from the fact graph.
    pub fn build(key: &Key, fact: &Fact, parent: Option<&Fact>) -> Result<Self> {
        let aspect = key.aspect();
        let quiz = match (fact, aspect) {
            (Fact::Sentence(sentence), Some(Aspect::Meaning)) => Self::Comprehension {
                sentence: sentence.plain_text(),
                translations: sentence.translations.clone(),
            },
            (Fact::Sentence(sentence), Some(Aspect::Reading)) => Self::Reading {
                prompt: sentence.plain_text(),
                accepted: vec![sentence.reading_text()],
            },
            (Fact::Vocab(vocab), Some(Aspect::Meaning)) => Self::VocabMeaning {
                forms: vocab.joined_forms(),
                definition: vocab.definition.clone(),
            },
            (Fact::Vocab(vocab), Some(Aspect::Reading)) => Self::Reading {
                prompt: vocab.joined_forms(),
                accepted: vocab.readings(),
            },
            (Fact::Conjugated(conj), Some(Aspect::Conjugated)) => {
                let sentence = parent_sentence(key, parent)?;
                let expected = conj.expected.plain_text();
                let (left, right) = blank_out(&sentence.plain_text(), "", &expected, "")?;
                Self::Conjugation {
                    left,
                    right,
                    hint: conj.hint.plain_text(),
                    expected,
                }
            }
            (Fact::Particle(particle), Some(Aspect::Particle)) => {
                let sentence = parent_sentence(key, parent)?;
                let (left, right) = blank_out(
                    &sentence.plain_text(),
                    &particle.left,
                    &particle.cloze,
                    &particle.right,
                )?;
                Self::Particle {
                    left,
                    right,
                    expected: particle.cloze.clone(),
                }
            }
            (fact, _) => {
                return Err(Error::construction(format!(
                    "key {key} does not name an aspect of a {} fact",
                    fact.kind()
                )));
            }
        };
        Ok(quiz)
    }

    /// Whether this quiz takes a typed answer.
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            Self::Reading { .. } | Self::Conjugation { .. } | Self::Particle { .. }
        )
    }

    /// Prompt line with the blank in place, for fill-in quizzes.
    pub fn blanked(&self) -> Option<String> {
        match self {
            Self::Conjugation { left, right, .. } | Self::Particle { left, right, .. } => {
                Some(format!("{left}{BLANK}{right}"))
            }
            _ => None,
        }
    }

    /// The correct answer as shown in feedback.
    pub fn solution(&self) -> String {
        match self {
            Self::Comprehension { translations, .. } => {
                translations.values().cloned().collect::<Vec<_>>().join(" / ")
            }
            Self::VocabMeaning { definition, .. } => definition.clone(),
            Self::Reading { accepted, .. } => accepted.join("・"),
            Self::Conjugation { expected, .. } | Self::Particle { expected, .. } => {
                expected.clone()
            }
        }
    }

    /// Grade `answer`. Fails when the answer kind does not fit the quiz.
    pub fn grade(&self, answer: &Answer) -> Result<ReviewResult> {
        let passed = match (self, answer) {
            (Self::Comprehension { .. } | Self::VocabMeaning { .. }, Answer::Binary(knew)) => *knew,
            (Self::Reading { accepted, .. }, Answer::Text(text)) => {
                let given = normalize_reading(text);
                accepted.iter().any(|a| normalize_reading(a) == given)
            }
            (
                Self::Conjugation { expected, .. } | Self::Particle { expected, .. },
                Answer::Text(text),
            ) => text.trim() == expected.as_str(),
            (quiz, answer) => {
                let wanted = if quiz.expects_text() { "text" } else { "yes/no" };
                return Err(Error::InvalidAnswer(format!(
                    "{wanted} quiz cannot take {answer:?}"
                )));
            }
        };
        Ok(ReviewResult::from(passed))
    }
}

/// Fold a reading into a comparable form.
///
/// Trims, maps full-width ASCII and the ideographic space to ASCII,
/// lowercases, and maps katakana to hiragana.
pub fn normalize_reading(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{30A1}'..='\u{30F6}' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
            _ => c,
        })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{Conjugated, FactGraph, Particle, RubyText, SubFact, TextUnit, Vocab};
    use pretty_assertions::assert_eq;

    fn graph() -> FactGraph {
        let neko = Vocab::new(
            vec![
                RubyText::new(vec![TextUnit::ruby("猫", "ねこ")]),
                RubyText::plain("ネコ"),
            ],
            "cat",
        )
        .unwrap();
        let sentence = Sentence::new(
            RubyText::new(vec![
                TextUnit::ruby("猫", "ねこ"),
                "が".into(),
                TextUnit::ruby("魚", "さかな"),
                "を".into(),
                TextUnit::ruby("食", "た"),
                "べた".into(),
            ]),
            vec![
                SubFact::Vocab(neko),
                SubFact::Particle(Particle::new("魚", "を", "食べた")),
                SubFact::Conjugated(Conjugated::new(
                    vec![TextUnit::ruby("食", "た"), "べた".into()],
                    RubyText::plain("食べる"),
                )),
            ],
            BTreeMap::from([("en".to_string(), "The cat ate the fish".to_string())]),
        )
        .unwrap();
        FactGraph::build(vec![sentence]).unwrap()
    }

    fn quiz_for(graph: &FactGraph, key: &str) -> Quiz {
        let key = Key::from_raw(key);
        let (fact, parent) = graph.resolve(&key).unwrap();
        Quiz::build(&key, &fact, parent.as_deref()).unwrap()
    }

    #[test]
    fn test_katakana_reading_matches_hiragana() {
        let graph = graph();
        let quiz = quiz_for(&graph, "model/猫・ネコ/reading");
        assert!(quiz.expects_text());
        assert_eq!(
            quiz.grade(&Answer::Text("ネコ".into())).unwrap(),
            ReviewResult::Success
        );
        assert_eq!(
            quiz.grade(&Answer::Text(" ねこ ".into())).unwrap(),
            ReviewResult::Success
        );
        assert_eq!(
            quiz.grade(&Answer::Text("いぬ".into())).unwrap(),
            ReviewResult::Failure
        );
    }

    #[test]
    fn test_sentence_meaning_is_binary() {
        let graph = graph();
        let quiz = quiz_for(&graph, "model/猫が魚を食べた/meaning");
        assert!(!quiz.expects_text());
        assert_eq!(quiz.solution(), "The cat ate the fish");
        assert_eq!(
            quiz.grade(&Answer::Binary(false)).unwrap(),
            ReviewResult::Failure
        );
        assert!(matches!(
            quiz.grade(&Answer::Text("yes".into())),
            Err(Error::InvalidAnswer(_))
        ));
    }

    #[test]
    fn test_sentence_reading() {
        let graph = graph();
        let quiz = quiz_for(&graph, "model/猫が魚を食べた/reading");
        assert_eq!(
            quiz.grade(&Answer::Text("ねこがさかなをたべた".into())).unwrap(),
            ReviewResult::Success
        );
        assert!(quiz.grade(&Answer::Binary(true)).is_err());
    }

    #[test]
    fn test_conjugation_blanks_parent_span() {
        let graph = graph();
        let quiz = quiz_for(&graph, "model/猫が魚を食べた/conjugated/食べた");
        assert_eq!(quiz.blanked().as_deref(), Some("猫が魚を＿＿"));
        match &quiz {
            Quiz::Conjugation { hint, .. } => assert_eq!(hint, "食べる"),
            other => panic!("unexpected quiz {other:?}"),
        }
        assert!(quiz.grade(&Answer::Text("食べた".into())).unwrap().is_success());
        // exact match: the reading is not accepted
        assert!(!quiz.grade(&Answer::Text("たべた".into())).unwrap().is_success());
    }

    #[test]
    fn test_particle_fill() {
        let graph = graph();
        let quiz = quiz_for(&graph, "model/猫が魚を食べた/particle/魚_を_食べた");
        assert_eq!(quiz.blanked().as_deref(), Some("猫が魚＿＿食べた"));
        match &quiz {
            Quiz::Particle { left, right, .. } => {
                assert_eq!((left.as_str(), right.as_str()), ("猫が魚", "食べた"));
            }
            other => panic!("unexpected quiz {other:?}"),
        }
        assert!(quiz.grade(&Answer::Text("を".into())).unwrap().is_success());
        assert!(!quiz.grade(&Answer::Text("が".into())).unwrap().is_success());
    }

    #[test]
    fn test_child_without_parent_fails() {
        let fact = Fact::Particle(Particle::new("魚", "を", "食べた"));
        let key = Key::from_raw("model/猫が魚を食べた/particle/魚_を_食べた");
        assert!(matches!(
            Quiz::build(&key, &fact, None),
            Err(Error::MissingParent(_))
        ));
    }

    #[test]
    fn test_particle_missing_from_parent_fails() {
        let graph = graph();
        let (sentence, _) = graph
            .resolve(&Key::from_raw("model/猫が魚を食べた/meaning"))
            .unwrap();
        let fact = Fact::Particle(Particle::new("犬", "を", "食べた"));
        let key = Key::from_raw("model/猫が魚を食べた/particle/犬_を_食べた");
        assert!(matches!(
            Quiz::build(&key, &fact, Some(&*sentence)),
            Err(Error::Construction(_))
        ));
    }

    #[test]
    fn test_blank_out_uses_context() {
        // the first を is not the one between 魚 and 食べた
        let (left, right) = blank_out("本を魚を食べた", "魚", "を", "食べた").unwrap();
        assert_eq!((left.as_str(), right.as_str()), ("本を魚", "食べた"));
        assert!(blank_out("猫", "", "", "").is_err());
    }

    #[test]
    fn test_normalize_reading() {
        assert_eq!(normalize_reading("　ＡＢＣ　"), "abc");
        assert_eq!(normalize_reading("カタカナ"), "かたかな");
        assert_eq!(normalize_reading("ヴ"), "ゔ");
        assert_eq!(normalize_reading("ー"), "ー");
    }
}
