//! Telegram update handlers.
//!
//! New and edited messages go through the same endpoint: text is routed directly, voice
//! notes are transcribed first, and anything else is routed as empty text so the router
//! answers with its "please send text" reply.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use lexbot_core::domain::ChatId;

use crate::router::AppState;

mod text;
mod voice;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.text().is_some() {
        return text::handle_text(bot, msg, state).await;
    }

    if msg.voice().is_some() {
        return voice::handle_voice(bot, msg, state).await;
    }

    tracing::debug!(chat_id = msg.chat.id.0, "non-text message");
    state.pipeline.handle(ChatId(msg.chat.id.0), "").await;
    Ok(())
}
