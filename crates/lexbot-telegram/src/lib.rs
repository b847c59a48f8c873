//! Telegram adapter (teloxide).
//!
//! This crate implements the `lexbot-core` MessagingPort over the Telegram Bot API and
//! runs the long-polling dispatcher.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use lexbot_core::{
    domain::ChatId,
    errors::Error,
    messaging::port::{MessagingCapabilities, MessagingPort},
    Result,
};

/// Bot API hard limit for one text message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;
const VOICE_FILE_NAME: &str = "lexbot-voice.ogg";

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram rate limited; retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_voice: true,
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
        })
        .await?;
        Ok(())
    }

    async fn send_voice(&self, chat_id: ChatId, audio: Vec<u8>) -> Result<()> {
        self.with_retry(|| {
            self.bot.send_voice(
                Self::tg_chat(chat_id),
                InputFile::memory(audio.clone()).file_name(VOICE_FILE_NAME),
            )
        })
        .await?;
        Ok(())
    }
}
