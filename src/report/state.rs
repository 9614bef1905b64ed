//! Per-sender questionnaire progress.
//!
//! A sender without an entry is idle. An entry exists from the moment the
//! report flow starts until the last answer has been handed to the store.

use std::collections::HashMap;
use teloxide::types::UserId;

/// Answers collected so far; progress is always the number of answers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    answers: Vec<String>,
}

impl ConversationState {
    pub fn progress(&self) -> usize {
        self.answers.len()
    }

    #[cfg(test)]
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub(super) fn push(&mut self, answer: &str) {
        self.answers.push(answer.to_string());
    }

    pub(super) fn into_answers(self) -> Vec<String> {
        self.answers
    }
}

/// Open conversations keyed by sender
pub type ConversationStorage = HashMap<UserId, ConversationState>;
