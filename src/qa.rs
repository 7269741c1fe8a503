//! Q&A sidechannel: an append-only list both roles can post to.
//!
//! Delivery is at-least-once, so remote questions are deduplicated by id.
//! Order is arrival order on this participant; there is no global order.

#[cfg(test)]
#[path = "qa_test.rs"]
mod qa_test;

use std::collections::HashSet;

use frames::Question;
use tracing::debug;

/// Longest question accepted, in characters.
pub const MAX_QUESTION_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QaError {
    #[error("question is empty")]
    Empty,
    #[error("question exceeds {MAX_QUESTION_CHARS} characters")]
    TooLong,
}

#[derive(Debug, Default, Clone)]
pub struct QaBoard {
    questions: Vec<Question>,
    seen: HashSet<String>,
}

impl QaBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a local question. The returned question is what gets published.
    ///
    /// # Errors
    ///
    /// [`QaError::Empty`] for blank text, [`QaError::TooLong`] past the limit.
    pub fn ask(&mut self, author: &str, text: &str, now_ms: i64) -> Result<Question, QaError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QaError::Empty);
        }
        if text.chars().count() > MAX_QUESTION_CHARS {
            return Err(QaError::TooLong);
        }
        let question = Question {
            id: uuid::Uuid::new_v4().simple().to_string(),
            author: author.to_owned(),
            text: text.to_owned(),
            timestamp: now_ms,
        };
        self.seen.insert(question.id.clone());
        self.questions.push(question.clone());
        Ok(question)
    }

    /// Append a peer's question unless already seen or blank. Returns
    /// whether it was added.
    pub fn apply_remote(&mut self, question: Question) -> bool {
        if question.text.trim().is_empty() {
            debug!(id = %question.id, "blank remote question dropped");
            return false;
        }
        if !self.seen.insert(question.id.clone()) {
            return false;
        }
        self.questions.push(question);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
