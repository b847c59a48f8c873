//! Inbound update model.
//!
//! Mirrors the subset of the Telegram `Update` JSON the router consumes. Every other
//! platform field is dropped on deserialization; the transport owns it.

use serde::{Deserialize, Serialize};

use crate::domain::ChatId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<InboundMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<InboundMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub chat: Chat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Build a plain text update for `chat_id`.
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            message: Some(InboundMessage {
                text: Some(text.into()),
                chat: Chat { id: chat_id.0 },
            }),
            edited_message: None,
        }
    }

    /// The message carried by this update, preferring `message` over `edited_message`.
    pub fn inbound(&self) -> Option<&InboundMessage> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }

    /// Trimmed text of the first inbound message (`message`, then `edited_message`) that
    /// has any; `None` when every text is absent or blank.
    pub fn text_content(&self) -> Option<&str> {
        self.text_message().map(|(text, _)| text)
    }

    /// Chat of the message `text_content` reads from, else of `inbound`.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.text_message()
            .map(|(_, m)| m)
            .or_else(|| self.inbound())
            .map(|m| ChatId(m.chat.id))
    }

    fn text_message(&self) -> Option<(&str, &InboundMessage)> {
        [self.message.as_ref(), self.edited_message.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|m| {
                let text = m.text.as_deref()?.trim();
                (!text.is_empty()).then_some((text, m))
            })
    }
}
