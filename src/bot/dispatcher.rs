use super::commands::Command;
use super::event::InboundMessage;
use crate::catalog::replies::category;
use crate::catalog::ReplyCatalog;
use crate::report::{ConversationEngine, SightingStore};
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

/// Where a message goes, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The sender has an open report; the text is an answer even if it looks like a command
    Conversation,
    Command(Command),
    Fallback,
}

/// Single entry point for every inbound text message
pub struct Dispatcher<S> {
    engine: ConversationEngine<S>,
    catalog: Arc<ReplyCatalog>,
    bot_username: String,
}

impl<S: SightingStore> Dispatcher<S> {
    pub fn new(
        engine: ConversationEngine<S>,
        catalog: Arc<ReplyCatalog>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            catalog,
            bot_username: bot_username.into(),
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &ConversationEngine<S> {
        &self.engine
    }

    pub fn route(&self, message: &InboundMessage) -> Route {
        if self.engine.is_open(message.sender) {
            return Route::Conversation;
        }

        match Command::parse(message.text.trim(), &self.bot_username) {
            Ok(cmd) => Route::Command(cmd),
            Err(_) => Route::Fallback,
        }
    }

    /// Handle one message and return the replies to send, in order
    pub async fn dispatch(&mut self, message: &InboundMessage, now: i64) -> Vec<String> {
        let route = self.route(message);
        debug!(
            "Message from user {} in chat {} routed to {:?}",
            message.sender, message.chat_id, route
        );

        match route {
            Route::Conversation => {
                self.engine
                    .answer(message.sender, &message.text, now)
                    .await
            }
            Route::Command(cmd) => {
                info!("Received command from user {}: {:?}", message.sender, cmd);
                self.handle_command(message, cmd, now).await
            }
            Route::Fallback => vec![self.catalog.reply(category::UNKNOWN)],
        }
    }

    async fn handle_command(
        &mut self,
        message: &InboundMessage,
        cmd: Command,
        now: i64,
    ) -> Vec<String> {
        match cmd {
            Command::Start => vec![self.catalog.reply(category::START)],
            Command::Help => vec![self.help_text()],
            Command::Report => self.engine.start(message.sender, now),
            Command::Recent => vec![self.recent_text().await],
        }
    }

    fn help_text(&self) -> String {
        match self.catalog.get(category::HELP) {
            Some(templates) if !templates.is_empty() => templates.join("\n"),
            _ => Command::descriptions().to_string(),
        }
    }

    async fn recent_text(&self) -> String {
        match self.engine.store().render_recent().await {
            Ok(text) if text.is_empty() => self.catalog.reply(category::NO_RECENT),
            Ok(text) => text,
            Err(e) => {
                error!("Failed to render recent sightings: {:#}", e);
                "⚠️ Could not load recent sightings right now, please try again later.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::engine::tests::{Behavior, RecordingStore, CATALOG};
    use crate::report::{AnswerPolicy, RateLimiter};
    use crate::catalog::Blacklist;
    use teloxide::types::{ChatId, UserId};

    const ALICE: UserId = UserId(1);

    fn dispatcher(store: RecordingStore) -> Dispatcher<Arc<RecordingStore>> {
        let catalog = Arc::new(ReplyCatalog::parse(CATALOG).unwrap());
        let engine = ConversationEngine::new(
            Arc::new(store),
            catalog.clone(),
            Blacklist::default(),
            AnswerPolicy::new(3, 20),
            RateLimiter::new(3600),
        );
        Dispatcher::new(engine, catalog, "sighting_bot")
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage::new(ALICE, ChatId(1), text)
    }

    #[tokio::test]
    async fn test_routes_commands() {
        let d = dispatcher(RecordingStore::new(Behavior::Accept));

        assert_eq!(d.route(&msg("/report")), Route::Command(Command::Report));
        assert_eq!(
            d.route(&msg("/recent@sighting_bot")),
            Route::Command(Command::Recent)
        );
        assert_eq!(d.route(&msg("hello")), Route::Fallback);
        assert_eq!(d.route(&msg("/unknown")), Route::Fallback);
    }

    #[tokio::test]
    async fn test_conversation_takes_priority() {
        let mut d = dispatcher(RecordingStore::new(Behavior::Accept));
        d.dispatch(&msg("/report"), 1_000).await;

        assert_eq!(d.route(&msg("/help")), Route::Conversation);
        let replies = d.dispatch(&msg("/help"), 1_001).await;
        assert_eq!(replies, vec!["Where was it?".to_string()]);
        assert_eq!(
            d.engine().state(ALICE).unwrap().answers(),
            &["/help".to_string()]
        );
    }

    #[tokio::test]
    async fn test_full_report_through_dispatcher() {
        let mut d = dispatcher(RecordingStore::new(Behavior::Accept));

        assert_eq!(
            d.dispatch(&msg("/report"), 1_000).await,
            vec!["What is your name?".to_string()]
        );
        d.dispatch(&msg("Alice"), 1_001).await;
        d.dispatch(&msg("Loch Ness"), 1_002).await;
        let replies = d.dispatch(&msg("A long neck"), 1_003).await;

        assert_eq!(replies, vec!["Thanks!".to_string()]);
        assert!(!d.engine().is_open(ALICE));
        assert_eq!(d.engine().store().inserts().len(), 1);

        // the next message is a plain command again
        assert_eq!(d.route(&msg("/report")), Route::Command(Command::Report));
    }

    #[tokio::test]
    async fn test_fallback_reply() {
        let mut d = dispatcher(RecordingStore::new(Behavior::Accept));
        let replies = d.dispatch(&msg("what?"), 1_000).await;
        assert_eq!(replies, vec![ReplyCatalog::default().reply(category::UNKNOWN)]);
    }

    #[tokio::test]
    async fn test_help_lists_commands_without_catalog_entry() {
        let mut d = dispatcher(RecordingStore::new(Behavior::Accept));
        let replies = d.dispatch(&msg("/help"), 1_000).await;
        assert!(replies[0].contains("/report"));
        assert!(replies[0].contains("/recent"));
    }

    #[tokio::test]
    async fn test_recent_empty_and_filled() {
        let mut d = dispatcher(RecordingStore::new(Behavior::Accept));
        let replies = d.dispatch(&msg("/recent"), 1_000).await;
        assert_eq!(replies, vec![ReplyCatalog::default().reply(category::NO_RECENT)]);

        let mut store = RecordingStore::new(Behavior::Accept);
        store.recent = "Just now\nAlice\nLoch Ness\nA long neck".to_string();
        let mut d = dispatcher(store);
        let replies = d.dispatch(&msg("/recent"), 1_000).await;
        assert_eq!(replies, vec!["Just now\nAlice\nLoch Ness\nA long neck".to_string()]);
    }
}
