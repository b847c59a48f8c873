//! Routing/dispatch core.
//!
//! `route` walks one update through extract -> classify -> resolve -> invoke ->
//! post-process. Every step except invoke is infallible: blank input and unknown keys
//! produce fixed replies, and the decorative summary pass swallows its own failures.

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;

use crate::{
    capability::Reply,
    classifier::IntentClassifier,
    domain::CapabilityKey,
    errors::Error,
    llm::{GenerateOptions, LanguageModel},
    registry::{PostProcess, Registry, RegistryEntry},
    update::Update,
    Result,
};

const AGENT_COMMAND: &str = "/agent";

/// Fixed user-facing replies for the short-circuit branches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterReplies {
    pub empty_text: String,
    pub unknown_capability: String,
    pub agent_usage: String,
}

impl Default for RouterReplies {
    fn default() -> Self {
        Self {
            empty_text: "🤖 Please send me some text to work with.".to_string(),
            unknown_capability: "🤷 Sorry, I don't know how to help with that yet.".to_string(),
            agent_usage: "Usage: /agent [name] [query]".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub replies: RouterReplies,
    /// Upper bound on waiting for a pending capability result.
    pub dispatch_timeout: Duration,
    /// Upper bound on the summary call; elapsing it just skips the summary.
    pub summary_timeout: Duration,
    pub summary_max_tokens: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            replies: RouterReplies::default(),
            dispatch_timeout: Duration::from_secs(120),
            summary_timeout: Duration::from_secs(15),
            summary_max_tokens: 60,
        }
    }
}

/// Master router. Cheap to share behind `Arc`; holds no per-request state.
pub struct Router {
    classifier: IntentClassifier,
    registry: Arc<Registry>,
    llm: Arc<dyn LanguageModel>,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        classifier: IntentClassifier,
        registry: Arc<Registry>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            classifier,
            registry,
            llm,
            settings: RouterSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Route one inbound update to a reply string.
    ///
    /// Errors come only from the capability itself (including its timeout); callers are
    /// expected to turn them into an apology.
    pub async fn route(&self, update: &Update) -> Result<String> {
        let Some(text) = update.text_content() else {
            return Ok(self.settings.replies.empty_text.clone());
        };
        let chat_id = update.chat_id().map(|c| c.0);

        if let Some(command) = AgentCommand::parse(text) {
            return self.route_command(chat_id, command).await;
        }

        let key = self.classifier.classify(text);
        tracing::info!(?chat_id, %key, "routing message");

        let Some(entry) = self.registry.get(key) else {
            tracing::info!(?chat_id, %key, "no capability registered for key");
            return Ok(self.settings.replies.unknown_capability.clone());
        };

        self.dispatch(key, entry, text).await
    }

    async fn route_command(
        &self,
        chat_id: Option<i64>,
        command: AgentCommand<'_>,
    ) -> Result<String> {
        let AgentCommand::Invoke { name, query } = command else {
            return Ok(self.settings.replies.agent_usage.clone());
        };
        let Some((key, entry)) = self.registry.find(name) else {
            return Ok(format!("Unknown agent '{name}'."));
        };
        tracing::info!(?chat_id, %key, "explicit agent command");
        self.dispatch(key, entry, query).await
    }

    async fn dispatch(
        &self,
        key: CapabilityKey,
        entry: &RegistryEntry,
        query: &str,
    ) -> Result<String> {
        let result = self.invoke(key, entry, query).await?;
        match entry.post_process {
            PostProcess::None => Ok(result),
            PostProcess::WittySummary => Ok(self.prepend_summary(key, result).await),
        }
    }

    async fn invoke(
        &self,
        key: CapabilityKey,
        entry: &RegistryEntry,
        query: &str,
    ) -> Result<String> {
        let reply = entry
            .capability
            .run(query)
            .map_err(|e| capability_error(key, e))?;

        match reply {
            Reply::Immediate(text) => Ok(text),
            Reply::Pending(fut) => match timeout(self.settings.dispatch_timeout, fut).await {
                Ok(res) => res.map_err(|e| capability_error(key, e)),
                Err(_) => Err(Error::Timeout {
                    what: format!("capability '{key}'"),
                    after: self.settings.dispatch_timeout,
                }),
            },
        }
    }

    async fn prepend_summary(&self, key: CapabilityKey, result: String) -> String {
        if result.trim().is_empty() {
            return result;
        }

        let prompt = summary_prompt(&result);
        let call = self.llm.generate(
            &prompt,
            GenerateOptions::max_tokens(self.settings.summary_max_tokens),
        );
        let summary = match timeout(self.settings.summary_timeout, call).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                tracing::warn!(%key, error = %e, "summary generation failed; skipping summary");
                return result;
            }
            Err(_) => {
                tracing::warn!(
                    %key,
                    timeout = ?self.settings.summary_timeout,
                    "summary generation timed out; skipping summary"
                );
                return result;
            }
        };

        let summary = summary.trim();
        if summary.is_empty() {
            return result;
        }
        format!("🕵️ {summary}\n\n{result}")
    }
}

fn summary_prompt(result: &str) -> String {
    format!(
        "In a single witty sentence, summarize this legal explanation for Telegram:\n\n{result}\n"
    )
}

fn capability_error(key: CapabilityKey, err: Error) -> Error {
    match err {
        Error::Timeout { .. } | Error::Capability { .. } => err,
        other => Error::Capability {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

/// `/agent <name> <query>`: explicit dispatch that bypasses the classifier.
#[derive(Debug, PartialEq, Eq)]
enum AgentCommand<'a> {
    Usage,
    Invoke { name: &'a str, query: &'a str },
}

impl<'a> AgentCommand<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix(AGENT_COMMAND)?;
        // `/agent@SomeBot name query` is how Telegram addresses commands in groups.
        let rest = match rest.strip_prefix('@') {
            Some(addressed) => addressed
                .split_once(char::is_whitespace)
                .map_or("", |(_, r)| r),
            None if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
            None => return None,
        };

        let rest = rest.trim_start();
        let Some((name, query)) = rest.split_once(char::is_whitespace) else {
            return Some(AgentCommand::Usage);
        };
        let query = query.trim();
        if query.is_empty() {
            return Some(AgentCommand::Usage);
        }
        Some(AgentCommand::Invoke { name, query })
    }
}
