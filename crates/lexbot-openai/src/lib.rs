//! OpenAI adapter: chat completions (the shared `LanguageModel`), voice transcription
//! and speech synthesis.
//!
//! The same client talks to a local llama.cpp-style server when configured with its
//! base URL, since those expose the OpenAI wire format.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};

use lexbot_core::{
    config::{LlmBackend, LlmConfig},
    errors::Error,
    llm::{GenerateOptions, LanguageModel},
    messaging::port::SpeechSynthesizer,
    Result,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const TRANSCRIBE_MODEL: &str = "gpt-4o-transcribe";
const SPEECH_MODEL: &str = "tts-1";
const SPEECH_VOICE: &str = "alloy";
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    backend: LlmBackend,
    base_url: String,
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Client for the hosted OpenAI API with the default chat model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(&LlmConfig {
            backend: LlmBackend::OpenAi,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: Some(api_key.into()),
            model: "gpt-3.5-turbo".to_string(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        tracing::info!(backend = cfg.backend.as_str(), model = %cfg.model, "initialized llm client");
        Ok(Self {
            backend: cfg.backend.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| Error::External(format!("{what} request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "{what} failed: {status} {}",
                body.chars().take(ERROR_BODY_PREVIEW).collect::<String>()
            )));
        }
        Ok(resp)
    }

    pub async fn transcribe_file(&self, path: &Path, prompt: Option<&str>) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(Error::Io)?;

        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("audio.ogg")
            .to_string();

        let mut form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIBE_MODEL)
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/ogg")
                    .map_err(|e| Error::External(format!("openai multipart error: {e}")))?,
            );

        if let Some(p) = prompt {
            if !p.trim().is_empty() {
                form = form.text("prompt", p.to_string());
            }
        }

        let resp = self
            .send(
                self.http
                    .post(self.endpoint("audio/transcriptions"))
                    .multipart(form),
                "openai transcription",
            )
            .await?;

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("openai json error: {e}")))?;

        let text = v
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string();

        if text.trim().is_empty() {
            return Err(Error::External(
                "openai transcription returned empty text".to_string(),
            ));
        }

        Ok(text)
    }

    /// Text to OGG/Opus speech, ready to send as a voice note.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        let body = json!({
            "model": SPEECH_MODEL,
            "voice": SPEECH_VOICE,
            "input": text,
            "response_format": "opus",
        });
        let resp = self
            .send(
                self.http.post(self.endpoint("audio/speech")).json(&body),
                "openai speech",
            )
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("openai speech body error: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn backend(&self) -> &str {
        self.backend.as_str()
    }

    async fn generate(&self, prompt: &str, opts: GenerateOptions) -> Result<String> {
        let body = chat_request_body(&self.model, prompt, &opts);
        let resp = self
            .send(
                self.http.post(self.endpoint("chat/completions")).json(&body),
                "chat completion",
            )
            .await?;
        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("chat completion json error: {e}")))?;
        parse_chat_completion(&v)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.synthesize_speech(text).await
    }
}

fn chat_request_body(default_model: &str, prompt: &str, opts: &GenerateOptions) -> Value {
    let mut body = json!({
        "model": opts.model.as_deref().unwrap_or(default_model),
        "messages": [{"role": "user", "content": prompt}],
    });
    if let Some(max_tokens) = opts.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = opts.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

fn parse_chat_completion(v: &Value) -> Result<String> {
    let content = v
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| Error::External("chat completion missing choices[0].message.content".to_string()))?;

    if content.trim().is_empty() {
        return Err(Error::External("chat completion returned empty content".to_string()));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_includes_only_set_options() {
        let body = chat_request_body("gpt-3.5-turbo", "hello world", &GenerateOptions::default());
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello world");
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());

        let opts = GenerateOptions {
            max_tokens: Some(60),
            temperature: Some(0.5),
            model: Some("gpt-4o-mini".to_string()),
        };
        let body = chat_request_body("gpt-3.5-turbo", "x", &opts);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 60);
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn parses_first_choice_content() {
        let v = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "openai-response"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        });
        assert_eq!(parse_chat_completion(&v).unwrap(), "openai-response");
    }

    #[test]
    fn missing_or_empty_content_is_an_error() {
        assert!(parse_chat_completion(&json!({"choices": []})).is_err());
        assert!(parse_chat_completion(&json!({"error": {"message": "nope"}})).is_err());
        let empty = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(parse_chat_completion(&empty).is_err());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OpenAiClient::from_config(&LlmConfig {
            backend: LlmBackend::Llama,
            base_url: "http://localhost:8080/v1/".to_string(),
            api_key: None,
            model: "llama".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(
            client.endpoint("chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(client.backend(), "llama");
    }
}
