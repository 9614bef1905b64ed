use super::cooldown::RateLimiter;
use super::state::{ConversationState, ConversationStorage};
use super::store::{InsertOutcome, SightingStore};
use super::validation::{AnswerPolicy, AnswerVerdict, FieldViolation};
use crate::catalog::replies::category;
use crate::catalog::{Blacklist, ReplyCatalog};
use std::sync::Arc;
use teloxide::types::UserId;
use tracing::{debug, error, info, warn};

/// Drives each sender through the questionnaire.
///
/// Every method returns the texts to send back, in order. The engine is owned
/// by a single dispatch loop, so state is mutated through `&mut self`.
pub struct ConversationEngine<S> {
    store: S,
    catalog: Arc<ReplyCatalog>,
    blacklist: Blacklist,
    policy: AnswerPolicy,
    limiter: RateLimiter,
    conversations: ConversationStorage,
}

impl<S: SightingStore> ConversationEngine<S> {
    pub fn new(
        store: S,
        catalog: Arc<ReplyCatalog>,
        blacklist: Blacklist,
        policy: AnswerPolicy,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            catalog,
            blacklist,
            policy,
            limiter,
            conversations: ConversationStorage::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_open(&self, sender: UserId) -> bool {
        self.conversations.contains_key(&sender)
    }

    #[cfg(test)]
    pub fn state(&self, sender: UserId) -> Option<&ConversationState> {
        self.conversations.get(&sender)
    }

    #[cfg(test)]
    pub fn open_conversations(&self) -> usize {
        self.conversations.len()
    }

    fn question_count(&self) -> usize {
        self.catalog.questions().len()
    }

    fn question(&self, index: usize) -> String {
        self.catalog
            .questions()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Open a report for `sender` unless they are blacklisted or cooling down.
    ///
    /// A sender who already has a report open is asked the pending question again.
    pub fn start(&mut self, sender: UserId, now: i64) -> Vec<String> {
        if let Some(state) = self.conversations.get(&sender) {
            return vec![self.question(state.progress())];
        }

        if self.blacklist.contains(sender) {
            info!(
                "Denied report from blacklisted user {} ({} offenses)",
                sender,
                self.blacklist.offenses(sender)
            );
            return vec![self.catalog.reply(category::BLACKLISTED)];
        }

        if self.limiter.is_recent_reporter(sender, now) {
            info!("Denied report from user {}: still in cooldown", sender);
            return vec![self.catalog.reply(category::COOLDOWN)];
        }

        self.conversations
            .insert(sender, ConversationState::default());
        info!("User {} started a report", sender);
        vec![self.question(0)]
    }

    /// Feed one message from a sender with an open report.
    ///
    /// A rejected answer leaves the state unchanged and repeats the question.
    /// The last accepted answer closes the report and writes it to the store.
    pub async fn answer(&mut self, sender: UserId, text: &str, now: i64) -> Vec<String> {
        let Some(progress) = self.conversations.get(&sender).map(ConversationState::progress)
        else {
            warn!("Answer from user {} without an open report", sender);
            return Vec::new();
        };

        match self.policy.check(text) {
            AnswerVerdict::Accepted => {}
            AnswerVerdict::NonAscii => {
                debug!("User {} answered question {} with non-ASCII text", sender, progress);
                return vec![
                    self.catalog.reply(category::INVALID_CHARACTERS),
                    self.question(progress),
                ];
            }
            verdict @ (AnswerVerdict::TooShort | AnswerVerdict::TooLong) => {
                debug!("User {} answer to question {} rejected: {:?}", sender, progress, verdict);
                return vec![self.invalid_answer_notice(), self.question(progress)];
            }
        }

        let progress = match self.conversations.get_mut(&sender) {
            Some(state) => {
                state.push(text);
                state.progress()
            }
            None => return Vec::new(),
        };
        debug!("User {} progress {}/{}", sender, progress, self.question_count());

        if progress < self.question_count() {
            return vec![self.question(progress)];
        }

        match self.conversations.remove(&sender) {
            Some(state) => self.complete(sender, state.into_answers(), now).await,
            None => Vec::new(),
        }
    }

    /// Persist a finished questionnaire. The state is already gone; no retry.
    async fn complete(&mut self, sender: UserId, answers: Vec<String>, now: i64) -> Vec<String> {
        match self.store.insert(&answers).await {
            Ok(InsertOutcome::Accepted) => {
                self.limiter.record_submission(sender, now);
                info!(
                    "✅ Stored report from user {} ({} senders cooling down)",
                    sender,
                    self.limiter.len()
                );
                vec![self.catalog.reply(category::THANKS)]
            }
            Ok(InsertOutcome::Rejected(violations)) => {
                warn!(
                    "Rejected report from user {}: {} invalid fields",
                    sender,
                    violations.len()
                );
                vec![self.invalid_submission_notice(&violations)]
            }
            Err(e) => {
                error!("❌ Failed to store report from user {}: {:#}", sender, e);
                let mut notice = self.catalog.reply(category::FAILURE);
                notice.push_str("\n\nYour answers were:");
                for answer in &answers {
                    notice.push('\n');
                    notice.push_str(answer);
                }
                vec![notice]
            }
        }
    }

    fn invalid_answer_notice(&self) -> String {
        self.catalog
            .reply(category::INVALID_ANSWER)
            .replace("{min}", &self.policy.min_length.to_string())
            .replace("{max}", &self.policy.max_length.to_string())
    }

    fn invalid_submission_notice(&self, violations: &[FieldViolation]) -> String {
        let mut notice = self.catalog.reply(category::INVALID_SUBMISSION);
        for violation in violations {
            notice.push_str(&format!(
                "\n- {}: {} characters (allowed {}-{})",
                violation.field, violation.length, self.policy.min_length, self.policy.max_length
            ));
        }
        notice
    }
}
