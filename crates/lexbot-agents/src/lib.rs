//! Concrete capabilities and the registry builder that wires them to config.

use std::sync::Arc;

use lexbot_core::{
    capability::Reply,
    config::Config,
    domain::CapabilityKey,
    llm::{GenerateOptions, LanguageModel},
    registry::{PostProcess, Registry},
    Result,
};
use lexbot_pinecone::IndexHandle;

pub mod case_law;
pub mod file_conversion;
pub mod generic;
pub mod memo;
pub mod scheduler;

pub use case_law::CaseLawScholar;
pub use file_conversion::FileConversion;
pub use generic::GenericAnswer;
pub use memo::MemoDrafter;
pub use scheduler::ReminderScheduler;

/// Token cap for the prompt-driven capabilities.
pub(crate) const ANSWER_MAX_TOKENS: u32 = 500;

/// Pending reply that runs one LLM call. Owns clones of everything it needs.
pub(crate) fn llm_reply(llm: &Arc<dyn LanguageModel>, prompt: String) -> Reply {
    let llm = Arc::clone(llm);
    Reply::pending(async move {
        llm.generate(&prompt, GenerateOptions::max_tokens(ANSWER_MAX_TOKENS))
            .await
    })
}

/// Vector-index handles the knowledge capabilities are bound to.
#[derive(Clone, Debug)]
pub struct KnowledgeIndexes {
    pub case_law: IndexHandle,
    pub memo: IndexHandle,
}

/// Bootstrap the Pinecone indexes and build the registry.
///
/// Any bootstrap failure is returned as-is; the caller treats it as fatal.
pub async fn build_registry(cfg: &Config, llm: Arc<dyn LanguageModel>) -> Result<Registry> {
    let case_law = lexbot_pinecone::ensure_index_from_config(&cfg.caselaw_index).await?;
    let memo = lexbot_pinecone::ensure_index_from_config(&cfg.memo_index).await?;
    FileConversion::from_config(cfg).probe_tools().await;
    registry_with_indexes(cfg, llm, KnowledgeIndexes { case_law, memo })
}

/// Registry from already-resolved indexes.
pub fn registry_with_indexes(
    cfg: &Config,
    llm: Arc<dyn LanguageModel>,
    indexes: KnowledgeIndexes,
) -> Result<Registry> {
    let mut builder = Registry::builder()
        .register_with(
            CapabilityKey::CASE_LAW_SCHOLAR,
            Arc::new(CaseLawScholar::new(llm.clone(), indexes.case_law)),
            PostProcess::WittySummary,
        )
        .register(
            CapabilityKey::MEMO_DRAFTER,
            Arc::new(MemoDrafter::new(llm.clone(), indexes.memo)),
        )
        .register(
            CapabilityKey::FILE_CONVERSION,
            Arc::new(FileConversion::from_config(cfg)),
        );

    match &cfg.n8n {
        Some(n8n) => {
            builder = builder.register(
                CapabilityKey::N8N_SCHEDULER,
                Arc::new(ReminderScheduler::new(n8n.clone())?),
            );
        }
        None => tracing::info!("N8N_WEBHOOK_URL not set; scheduler capability disabled"),
    }

    if cfg.generic_fallback_enabled {
        builder = builder.register(CapabilityKey::HELP, Arc::new(GenericAnswer::new(llm)));
    }

    let registry = builder.build();
    let keys: Vec<&str> = registry.keys().iter().map(|k| k.as_str()).collect();
    tracing::info!(capabilities = ?keys, "capability registry built");
    Ok(registry)
}
