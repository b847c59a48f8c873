//! Reply delivery for one inbound message.
//!
//! Transport-agnostic glue between the router and a `MessagingPort`: route the text,
//! substitute an apology when the capability fails, send the reply in chunks, and
//! optionally follow up with a synthesized witty voice note.

use std::sync::Arc;

use crate::{
    domain::ChatId,
    formatting::split_message,
    llm::{GenerateOptions, LanguageModel},
    messaging::port::{MessagingPort, SpeechSynthesizer},
    router::Router,
    update::Update,
};

#[derive(Clone, Debug)]
pub struct DeliverySettings {
    /// Chunk size for outgoing text (below the platform hard limit).
    pub safe_limit: usize,
    pub apology: String,
    pub witty_voice: bool,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            safe_limit: 4000,
            apology: "⚠️ Sorry, something went wrong while handling your request.".to_string(),
            witty_voice: false,
        }
    }
}

/// What was produced for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub reply: String,
    pub witty: Option<String>,
    pub chunks_sent: usize,
    pub voice_sent: bool,
}

pub struct ReplyPipeline {
    router: Arc<Router>,
    llm: Arc<dyn LanguageModel>,
    messenger: Arc<dyn MessagingPort>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    settings: DeliverySettings,
}

impl ReplyPipeline {
    pub fn new(
        router: Arc<Router>,
        llm: Arc<dyn LanguageModel>,
        messenger: Arc<dyn MessagingPort>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            router,
            llm,
            messenger,
            speech,
            settings,
        }
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }

    /// Route `user_input` and deliver the result to `chat_id`.
    ///
    /// Never fails: routing errors become the apology, send errors are logged.
    pub async fn handle(&self, chat_id: ChatId, user_input: &str) -> DeliveryReport {
        let update = Update::text(chat_id, user_input);
        let reply = match self.router.route(&update).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(chat_id = chat_id.0, error = %e, "routing failed");
                self.settings.apology.clone()
            }
        };

        let witty = if self.settings.witty_voice && self.speech.is_some() {
            self.witty_line(user_input).await
        } else {
            None
        };

        let mut chunks_sent = 0usize;
        if !reply.trim().is_empty() {
            let limit = self
                .settings
                .safe_limit
                .min(self.messenger.capabilities().max_message_len);
            for chunk in split_message(&reply, limit) {
                if let Err(e) = self.messenger.send_text(chat_id, &chunk).await {
                    tracing::error!(chat_id = chat_id.0, error = %e, "failed to send text reply");
                    break;
                }
                chunks_sent += 1;
            }
        }

        let voice_sent = match (&witty, &self.speech) {
            (Some(line), Some(speech)) => self.send_voice(chat_id, speech.as_ref(), line).await,
            _ => false,
        };

        DeliveryReport {
            reply,
            witty,
            chunks_sent,
            voice_sent,
        }
    }

    async fn witty_line(&self, user_input: &str) -> Option<String> {
        if user_input.trim().is_empty() {
            return None;
        }
        let prompt = format!("Give me a short, witty one-liner about: {user_input}");
        match self
            .llm
            .generate(&prompt, GenerateOptions::max_tokens(50).with_temperature(0.8))
            .await
        {
            Ok(line) => {
                let line = line.trim().to_string();
                tracing::info!(witty = %line, "witty line generated");
                (!line.is_empty()).then_some(line)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to generate witty line");
                None
            }
        }
    }

    async fn send_voice(
        &self,
        chat_id: ChatId,
        speech: &dyn SpeechSynthesizer,
        line: &str,
    ) -> bool {
        if !self.messenger.capabilities().supports_voice {
            return false;
        }
        let audio = match speech.synthesize(line).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::error!(error = %e, "speech synthesis failed");
                return false;
            }
        };
        match self.messenger.send_voice(chat_id, audio).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(chat_id = chat_id.0, error = %e, "failed to send witty voice note");
                false
            }
        }
    }
}
