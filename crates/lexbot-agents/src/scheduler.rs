//! Reminder scheduling delegated to an n8n webhook workflow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use lexbot_core::{
    capability::{Capability, Reply},
    config::N8nConfig,
    errors::Error,
    Result,
};

const DEFAULT_ACK: &str = "⏰ Got it. I've passed that on to the scheduler.";
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    query: &'a str,
    requested_at: String,
}

pub struct ReminderScheduler {
    cfg: N8nConfig,
    http: reqwest::Client,
}

impl ReminderScheduler {
    pub fn new(cfg: N8nConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        tracing::info!(webhook = %cfg.webhook_url, "n8n scheduler configured");
        Ok(Self { cfg, http })
    }
}

impl Capability for ReminderScheduler {
    fn name(&self) -> &'static str {
        "n8n_scheduler"
    }

    fn run(&self, query: &str) -> Result<Reply> {
        let body = serde_json::to_value(WebhookPayload {
            query,
            requested_at: requested_at(Utc::now()),
        })?;

        let mut req = self.http.post(&self.cfg.webhook_url).json(&body);
        if let Some(user) = &self.cfg.user {
            req = req.basic_auth(user, self.cfg.password.as_ref());
        }

        Ok(Reply::pending(async move {
            let resp = req
                .send()
                .await
                .map_err(|e| Error::External(format!("n8n webhook request error: {e}")))?;
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(Error::External(format!(
                    "n8n webhook failed: {status} {}",
                    text.chars().take(ERROR_BODY_PREVIEW).collect::<String>()
                )));
            }
            tracing::info!(%status, "n8n webhook accepted reminder");
            Ok(reply_from_body(&text))
        }))
    }
}

fn requested_at(now: DateTime<Utc>) -> String {
    now.to_rfc3339()
}

/// The workflow may answer with `{"reply": ...}` or `{"message": ...}`; anything else
/// gets the stock acknowledgement.
fn reply_from_body(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return DEFAULT_ACK.to_string();
    };
    ["reply", "message"]
        .iter()
        .filter_map(|field| v.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_ACK.to_string())
}
