//! Language-model port.
//!
//! Capabilities and the router only see `LanguageModel`; the HTTP backend lives in
//! `lexbot-openai`.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;

use crate::Result;

const LOG_PREVIEW_CHARS: usize = 200;

/// Per-call generation options. Unset fields use the backend default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub model: Option<String>,
}

impl GenerateOptions {
    pub fn max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short backend name used in logs (`openai`, `llama`, ...).
    fn backend(&self) -> &str;

    async fn generate(&self, prompt: &str, opts: GenerateOptions) -> Result<String>;
}

/// `LanguageModel` decorator that logs every call: prompt and options on start,
/// elapsed time and a truncated response on completion.
pub struct LoggedModel {
    inner: Arc<dyn LanguageModel>,
}

impl LoggedModel {
    pub fn new(inner: Arc<dyn LanguageModel>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LanguageModel for LoggedModel {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn generate(&self, prompt: &str, opts: GenerateOptions) -> Result<String> {
        tracing::info!(
            backend = self.inner.backend(),
            prompt = %preview(prompt),
            max_tokens = ?opts.max_tokens,
            temperature = ?opts.temperature,
            "llm generate start"
        );
        let started = Instant::now();

        match self.inner.generate(prompt, opts).await {
            Ok(text) => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    response = %preview(&text),
                    "llm generate completed"
                );
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "llm generate failed"
                );
                Err(e)
            }
        }
    }
}

/// Truncate long text for log lines.
pub fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{head}...(truncated)")
}
