//! Tribal-sovereignty case-law research.

use std::sync::Arc;

use lexbot_core::{
    capability::{Capability, Reply},
    llm::LanguageModel,
    Result,
};
use lexbot_pinecone::IndexHandle;

use crate::llm_reply;

pub struct CaseLawScholar {
    llm: Arc<dyn LanguageModel>,
    index: IndexHandle,
}

impl CaseLawScholar {
    pub fn new(llm: Arc<dyn LanguageModel>, index: IndexHandle) -> Self {
        tracing::info!(index = %index.name, host = %index.host, "case-law scholar bound to index");
        Self { llm, index }
    }

    /// Index queries and upserts go to.
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }
}

impl Capability for CaseLawScholar {
    fn name(&self) -> &'static str {
        "case_law_scholar"
    }

    fn run(&self, query: &str) -> Result<Reply> {
        Ok(llm_reply(
            &self.llm,
            format!("Research and summarize tribal sovereignty law: {query}"),
        ))
    }
}
