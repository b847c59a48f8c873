use std::sync::Arc;

use lexbot_core::{
    classifier::IntentClassifier,
    config::Config,
    llm::{LanguageModel, LoggedModel},
    router::{Router, RouterSettings},
};
use lexbot_openai::OpenAiClient;
use lexbot_telegram::router::BotServices;

#[tokio::main]
async fn main() -> Result<(), lexbot_core::Error> {
    lexbot_core::logging::init("lexbot")?;

    let cfg = Arc::new(Config::load()?);

    let backend: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&cfg.llm)?);
    let llm: Arc<dyn LanguageModel> = Arc::new(LoggedModel::new(backend));

    // Transcription and speech always go to OpenAI, whatever the chat backend is.
    let openai = cfg
        .openai_api_key
        .as_ref()
        .map(|key| OpenAiClient::new(key.clone()))
        .transpose()?;

    let registry = match lexbot_agents::build_registry(&cfg, llm.clone()).await {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::error!(error = %e, "capability bootstrap failed");
            return Err(e);
        }
    };

    let router = Arc::new(
        Router::new(IntentClassifier::new(&cfg.keywords), registry, llm.clone()).with_settings(
            RouterSettings {
                dispatch_timeout: cfg.dispatch_timeout,
                summary_timeout: cfg.summary_timeout,
                ..RouterSettings::default()
            },
        ),
    );

    lexbot_telegram::router::run_polling(
        cfg,
        BotServices {
            router,
            llm,
            openai,
        },
    )
    .await
    .map_err(|e| lexbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
