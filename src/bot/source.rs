use super::event::Polled;
use anyhow::{Context, Result};
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;

/// Where updates come from and where replies go
pub trait UpdateSource: Send + Sync {
    /// Fetch updates with id `>= offset`, waiting up to `timeout_sec` for one to arrive
    fn poll(
        &self,
        timeout_sec: u32,
        offset: Option<i32>,
    ) -> impl Future<Output = Result<Vec<Polled>>> + Send;

    fn send(&self, chat_id: ChatId, text: String) -> impl Future<Output = Result<()>> + Send;
}

/// Telegram Bot API long polling via teloxide
#[derive(Clone)]
pub struct TelegramSource {
    bot: Bot,
}

impl TelegramSource {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl UpdateSource for TelegramSource {
    async fn poll(&self, timeout_sec: u32, offset: Option<i32>) -> Result<Vec<Polled>> {
        let mut request = self
            .bot
            .get_updates()
            .timeout(timeout_sec)
            .allowed_updates(vec![AllowedUpdate::Message]);
        if let Some(offset) = offset {
            request = request.offset(offset);
        }

        let updates = request.await.context("getUpdates failed")?;
        Ok(updates.into_iter().map(Polled::from).collect())
    }

    async fn send(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.bot
            .send_message(chat_id, text)
            .await
            .with_context(|| format!("sendMessage to chat {} failed", chat_id))?;
        Ok(())
    }
}
