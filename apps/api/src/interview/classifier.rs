//! Answer Quality Classifier: decides whether an answer is a deflection that
//! should be retried instead of advancing the interview.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::transcript::NO_RESPONSE;

/// Phrases that mark a non-answer. Matched case-insensitively on word boundaries,
/// so "pass" does not fire on "passionate".
pub const DEFLECTION_PHRASES: &[&str] = &[
    "sorry",
    "i don't know",
    "i dont know",
    "not sure",
    "skip",
    "pass",
    "no idea",
];

/// Trimmed answers shorter than this are weak.
pub const MIN_ANSWER_CHARS: usize = 2;

/// Table-driven classifier. `Default` uses the built-in phrase list.
#[derive(Debug)]
pub struct AnswerClassifier {
    deflection: Regex,
    min_chars: usize,
}

static DEFAULT_CLASSIFIER: LazyLock<AnswerClassifier> =
    LazyLock::new(|| AnswerClassifier::new(DEFLECTION_PHRASES, MIN_ANSWER_CHARS));

impl AnswerClassifier {
    pub fn new(phrases: &[&str], min_chars: usize) -> Self {
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let deflection = Regex::new(&format!(r"\b(?:{alternation})\b")).expect("valid regex");
        Self {
            deflection,
            min_chars,
        }
    }

    /// True when the answer is a deflection, a placeholder, or too short.
    pub fn is_weak(&self, answer: &str) -> bool {
        let normalized = answer.trim().to_lowercase().replace(['\u{2018}', '\u{2019}'], "'");

        if normalized.chars().count() < self.min_chars || normalized == NO_RESPONSE.to_lowercase() {
            return true;
        }

        self.deflection.is_match(&normalized)
    }
}

impl Default for AnswerClassifier {
    fn default() -> Self {
        Self::new(DEFLECTION_PHRASES, MIN_ANSWER_CHARS)
    }
}

/// Classifies with the built-in phrase table.
pub fn is_weak(answer: &str) -> bool {
    DEFAULT_CLASSIFIER.is_weak(answer)
}
