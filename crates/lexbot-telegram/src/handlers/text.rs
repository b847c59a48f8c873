use std::sync::Arc;

use teloxide::{prelude::*, types::ChatAction};

use lexbot_core::domain::ChatId;

use crate::router::AppState;

pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);
    let username = msg
        .from()
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!(
        chat_id = chat_id.0,
        %username,
        edited = msg.edit_date().is_some(),
        chars = text.chars().count(),
        "text message"
    );

    // Best-effort: the reply can take a while.
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let report = state.pipeline.handle(chat_id, text).await;
    tracing::info!(
        chat_id = chat_id.0,
        chunks = report.chunks_sent,
        voice = report.voice_sent,
        "reply delivered"
    );
    Ok(())
}
