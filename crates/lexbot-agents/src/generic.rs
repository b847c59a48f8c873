//! Catch-all answer for messages no topical rule claims.

use std::sync::Arc;

use lexbot_core::{
    capability::{Capability, Reply},
    llm::LanguageModel,
    Result,
};

use crate::llm_reply;

pub struct GenericAnswer {
    llm: Arc<dyn LanguageModel>,
}

impl GenericAnswer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

impl Capability for GenericAnswer {
    fn name(&self) -> &'static str {
        "help"
    }

    fn run(&self, query: &str) -> Result<Reply> {
        Ok(llm_reply(
            &self.llm,
            format!("Answer this question as concisely and authoritatively as you can:\n\n{query}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingLlm;

    #[tokio::test]
    async fn answers_anything() {
        let llm = Arc::new(RecordingLlm::answering("Sunny."));
        let generic = GenericAnswer::new(llm.clone());
        let Reply::Pending(fut) = generic.run("What's the weather like?").unwrap() else {
            panic!("expected pending reply");
        };
        assert_eq!(fut.await.unwrap(), "Sunny.");
        assert_eq!(
            llm.prompts(),
            vec!["Answer this question as concisely and authoritatively as you can:\n\nWhat's the weather like?"]
        );
    }
}
