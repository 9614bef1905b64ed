pub mod commands;
pub mod dispatcher;
pub mod event;
pub mod source;

use crate::config::TelegramConfig;
use crate::report::SightingStore;
use chrono::Utc;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub use commands::Command;
pub use dispatcher::Dispatcher;
use event::Polled;
pub use source::{TelegramSource, UpdateSource};

/// Timing of the poll loop
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout_sec: u32,
    pub interval: Duration,
    pub send_timeout: Duration,
}

impl From<&TelegramConfig> for PollSettings {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            timeout_sec: config.poll_timeout_sec,
            interval: Duration::from_millis(config.poll_interval_ms),
            send_timeout: Duration::from_secs(config.send_timeout_sec),
        }
    }
}

/// Cursor for the next poll: one past the highest update id seen so far
pub fn next_offset(current: Option<i32>, batch: &[Polled]) -> Option<i32> {
    let batch_next = batch
        .iter()
        .map(|polled| i32::try_from(polled.update_id).unwrap_or(i32::MAX).saturating_add(1))
        .max();
    batch_next.max(current)
}

/// Poll forever: fetch a batch, dispatch it in delivery order, pause, repeat
pub async fn run<U, S>(source: U, mut dispatcher: Dispatcher<S>, settings: PollSettings)
where
    U: UpdateSource,
    S: SightingStore,
{
    info!(
        "🚀 Polling for updates (timeout: {}s, interval: {:?})",
        settings.timeout_sec, settings.interval
    );

    let mut offset = None;
    loop {
        offset = poll_once(&source, &mut dispatcher, &settings, offset).await;
        sleep(settings.interval).await;
    }
}

/// One poll round; returns the cursor for the next round.
///
/// Transport errors leave the cursor unchanged. Malformed updates still
/// advance it so they are never delivered again.
pub async fn poll_once<U, S>(
    source: &U,
    dispatcher: &mut Dispatcher<S>,
    settings: &PollSettings,
    offset: Option<i32>,
) -> Option<i32>
where
    U: UpdateSource,
    S: SightingStore,
{
    let batch = match source.poll(settings.timeout_sec, offset).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!("Polling failed, retrying next round: {:#}", e);
            return offset;
        }
    };

    let next = next_offset(offset, &batch);
    if !batch.is_empty() {
        debug!("Got {} updates, next offset {:?}", batch.len(), next);
    }

    for polled in batch {
        let message = match polled.event {
            Ok(message) => message,
            Err(e) => {
                debug!("Skipping update {}: {}", polled.update_id, e);
                continue;
            }
        };

        let replies = dispatcher.dispatch(&message, Utc::now().timestamp()).await;
        for reply in replies {
            deliver(source, message.chat_id, reply, settings.send_timeout).await;
        }
    }

    next
}

/// Send one reply; failures and timeouts are logged, never propagated
async fn deliver<U: UpdateSource>(source: &U, chat_id: ChatId, text: String, timeout: Duration) {
    match tokio::time::timeout(timeout, source.send(chat_id, text)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to send reply to chat {}: {:#}", chat_id, e),
        Err(_) => warn!("Timed out after {:?} sending reply to chat {}", timeout, chat_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::event::{InboundMessage, MalformedEvent};
    use crate::catalog::{Blacklist, ReplyCatalog};
    use crate::report::engine::tests::{Behavior, RecordingStore, CATALOG};
    use crate::report::{AnswerPolicy, ConversationEngine, RateLimiter};
    use anyhow::{anyhow, Result};
    use std::sync::{Arc, Mutex};
    use teloxide::types::UserId;

    /// Serves every stored update whose id is at or above the requested offset
    struct ReplaySource {
        updates: Mutex<Vec<Polled>>,
        offsets: Mutex<Vec<Option<i32>>>,
        sent: Mutex<Vec<(ChatId, String)>>,
        fail_polls: Mutex<usize>,
        stall_sends: bool,
    }

    impl ReplaySource {
        fn new(updates: Vec<Polled>) -> Self {
            Self {
                updates: Mutex::new(updates),
                offsets: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                fail_polls: Mutex::new(0),
                stall_sends: false,
            }
        }

        fn push(&self, polled: Polled) {
            self.updates.lock().unwrap().push(polled);
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl UpdateSource for ReplaySource {
        async fn poll(&self, _timeout_sec: u32, offset: Option<i32>) -> Result<Vec<Polled>> {
            self.offsets.lock().unwrap().push(offset);
            {
                let mut fail = self.fail_polls.lock().unwrap();
                if *fail > 0 {
                    *fail -= 1;
                    return Err(anyhow!("connection reset"));
                }
            }
            let min = offset.unwrap_or(0);
            Ok(self
                .updates
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.update_id as i32 >= min)
                .cloned()
                .collect())
        }

        async fn send(&self, chat_id: ChatId, text: String) -> Result<()> {
            if self.stall_sends {
                std::future::pending::<()>().await;
            }
            self.sent.lock().unwrap().push((chat_id, text));
            Ok(())
        }
    }

    const ALICE: UserId = UserId(1);

    fn settings() -> PollSettings {
        PollSettings {
            timeout_sec: 0,
            interval: Duration::from_millis(0),
            send_timeout: Duration::from_millis(50),
        }
    }

    fn text(update_id: u32, text: &str) -> Polled {
        Polled {
            update_id,
            event: Ok(InboundMessage::new(ALICE, ChatId(1), text)),
        }
    }

    fn malformed(update_id: u32) -> Polled {
        Polled {
            update_id,
            event: Err(MalformedEvent::MissingText),
        }
    }

    fn dispatcher() -> Dispatcher<Arc<RecordingStore>> {
        let catalog = Arc::new(ReplyCatalog::parse(CATALOG).unwrap());
        let engine = ConversationEngine::new(
            Arc::new(RecordingStore::new(Behavior::Accept)),
            catalog.clone(),
            Blacklist::default(),
            AnswerPolicy::new(3, 20),
            RateLimiter::new(3600),
        );
        Dispatcher::new(engine, catalog, "sighting_bot")
    }

    #[test]
    fn test_next_offset() {
        assert_eq!(next_offset(None, &[]), None);
        assert_eq!(next_offset(Some(5), &[]), Some(5));
        assert_eq!(
            next_offset(None, &[text(3, "a"), text(9, "b"), malformed(4)]),
            Some(10)
        );
        assert_eq!(next_offset(Some(20), &[text(3, "a")]), Some(20));
    }

    #[tokio::test]
    async fn test_cursor_never_redelivers() {
        let source = ReplaySource::new(vec![text(1, "/report"), text(2, "Alice")]);
        let mut d = dispatcher();

        let offset = poll_once(&source, &mut d, &settings(), None).await;
        assert_eq!(offset, Some(3));
        assert_eq!(d.engine().state(ALICE).unwrap().progress(), 1);

        // nothing new: the same batch must not be processed again
        let offset = poll_once(&source, &mut d, &settings(), offset).await;
        assert_eq!(offset, Some(3));
        assert_eq!(d.engine().state(ALICE).unwrap().progress(), 1);

        source.push(text(3, "Loch Ness"));
        let offset = poll_once(&source, &mut d, &settings(), offset).await;
        assert_eq!(offset, Some(4));
        assert_eq!(d.engine().state(ALICE).unwrap().progress(), 2);

        assert_eq!(
            *source.offsets.lock().unwrap(),
            vec![None, Some(3), Some(3)]
        );
    }

    #[tokio::test]
    async fn test_malformed_updates_skipped_but_acknowledged() {
        let source = ReplaySource::new(vec![malformed(1), text(2, "hello"), malformed(3)]);
        let mut d = dispatcher();

        let offset = poll_once(&source, &mut d, &settings(), None).await;
        assert_eq!(offset, Some(4));
        assert_eq!(source.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_cursor() {
        let source = ReplaySource::new(vec![text(7, "/start")]);
        *source.fail_polls.lock().unwrap() = 1;
        let mut d = dispatcher();

        let offset = poll_once(&source, &mut d, &settings(), Some(7)).await;
        assert_eq!(offset, Some(7));
        assert!(source.sent().is_empty());

        let offset = poll_once(&source, &mut d, &settings(), offset).await;
        assert_eq!(offset, Some(8));
        assert_eq!(source.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_replies_sent_in_order() {
        let source = ReplaySource::new(vec![
            text(1, "/report"),
            text(2, "x"),
            text(3, "Alice"),
        ]);
        let mut d = dispatcher();
        poll_once(&source, &mut d, &settings(), None).await;

        assert_eq!(
            source.sent(),
            vec![
                "What is your name?".to_string(),
                "Between 3 and 20 please.".to_string(),
                "What is your name?".to_string(),
                "Where was it?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stalled_send_does_not_block_loop() {
        let mut source = ReplaySource::new(vec![text(1, "/report"), text(2, "Alice")]);
        source.stall_sends = true;
        let mut d = dispatcher();

        let offset = poll_once(&source, &mut d, &settings(), None).await;
        assert_eq!(offset, Some(3));
        assert_eq!(d.engine().state(ALICE).unwrap().progress(), 1);
    }
}
