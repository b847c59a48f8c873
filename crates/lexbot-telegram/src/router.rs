use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use lexbot_core::{
    config::Config,
    inbound::{DeliverySettings, ReplyPipeline},
    llm::LanguageModel,
    messaging::port::{MessagingPort, SpeechSynthesizer},
    router::Router,
};
use lexbot_openai::OpenAiClient;

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub pipeline: Arc<ReplyPipeline>,
    /// OpenAI client for voice transcription; `None` when no OpenAI key is configured.
    pub transcriber: Option<OpenAiClient>,
}

/// Everything the transport needs from startup wiring.
pub struct BotServices {
    pub router: Arc<Router>,
    pub llm: Arc<dyn LanguageModel>,
    pub openai: Option<OpenAiClient>,
}

pub fn delivery_settings(cfg: &Config) -> DeliverySettings {
    DeliverySettings {
        safe_limit: cfg.telegram_safe_limit,
        witty_voice: cfg.witty_voice_enabled,
        ..DeliverySettings::default()
    }
}

pub async fn run_polling(cfg: Arc<Config>, services: BotServices) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "lexbot started"),
        Err(e) => tracing::warn!(error = %e, "getMe failed; continuing"),
    }
    tracing::info!(
        capabilities = ?services.router.registry().keys(),
        transcription = services.openai.is_some(),
        witty_voice = cfg.witty_voice_enabled,
        "routing ready"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let speech: Option<Arc<dyn SpeechSynthesizer>> = match &services.openai {
        Some(client) if cfg.witty_voice_enabled => Some(Arc::new(client.clone())),
        None if cfg.witty_voice_enabled => {
            tracing::warn!("WITTY_VOICE_ENABLED needs OPENAI_API_KEY; voice notes disabled");
            None
        }
        _ => None,
    };

    let pipeline = Arc::new(ReplyPipeline::new(
        services.router,
        services.llm,
        messenger,
        speech,
        delivery_settings(&cfg),
    ));

    let state = Arc::new(AppState {
        cfg,
        pipeline,
        transcriber: services.openai,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_edited_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
