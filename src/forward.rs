use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("webhook returned status {0}")]
    Status(u16),
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Body sent to a bot's webhook: the fixed fields first, then every extra
/// field from the inbound request, which may overwrite them.
pub fn build_payload(message: &Value, bot_id: &Value, extra: &Map<String, Value>) -> Value {
    let mut payload = Map::new();
    payload.insert("message".into(), message.clone());
    payload.insert("botId".into(), bot_id.clone());
    payload.insert(
        "timestamp".into(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    for (key, value) in extra {
        payload.insert(key.clone(), value.clone());
    }
    Value::Object(payload)
}

/// Posts relay payloads to webhook destinations.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST `payload` as JSON and decode the JSON reply.
    pub async fn forward(&self, url: &str, payload: &Value) -> Result<Value, ForwardError> {
        let resp = self
            .client
            .post(url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }
        Ok(resp.json::<Value>().await?)
    }
}
