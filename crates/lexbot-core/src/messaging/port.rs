use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_voice: bool,
    pub max_message_len: usize,
}

/// Cross-messenger port used to deliver routed replies.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Send an OGG/Opus voice note.
    async fn send_voice(&self, chat_id: ChatId, audio: Vec<u8>) -> Result<()>;
}

/// Text-to-speech backend for voice replies.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns OGG/Opus audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
