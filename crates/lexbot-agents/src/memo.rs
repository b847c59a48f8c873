use std::sync::Arc;

use lexbot_core::{
    capability::{Capability, Reply},
    llm::LanguageModel,
    Result,
};
use lexbot_pinecone::IndexHandle;

use crate::llm_reply;

/// Drafts professional memos from a free-form request.
pub struct MemoDrafter {
    llm: Arc<dyn LanguageModel>,
    index: IndexHandle,
}

impl MemoDrafter {
    pub fn new(llm: Arc<dyn LanguageModel>, index: IndexHandle) -> Self {
        tracing::info!(index = %index.name, host = %index.host, "memo drafter bound to index");
        Self { llm, index }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }
}

impl Capability for MemoDrafter {
    fn name(&self) -> &'static str {
        "memo_drafter"
    }

    fn run(&self, query: &str) -> Result<Reply> {
        Ok(llm_reply(
            &self.llm,
            format!("Draft a professional memo based on: {query}"),
        ))
    }
}
