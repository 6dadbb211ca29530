use crate::config::RelayOptions;
use crate::forward::{ForwardError, WebhookClient, build_payload};
use crate::lookup::{BotDirectory, LookupError};
use anyhow::{Context, anyhow};
use axum::http::{HeaderMap, Method, StatusCode, header};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, warn};

/// Every way a relay request can end without a successful forward.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("botId is required")]
    MissingBotId { received: Value },
    #[error("message is required")]
    MissingMessage { received: Value },
    #[error("lookup service credentials not configured")]
    NotConfigured,
    #[error("database query failed with status {0}")]
    LookupStatus(u16),
    #[error("bot {bot_id} not found in {table}")]
    BotNotFound { bot_id: Value, table: String },
    #[error("bot {0} is inactive")]
    BotInactive(Value),
    #[error("webhook call failed with status {status}")]
    WebhookStatus { status: u16, webhook_url: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingBotId { .. } | RelayError::MissingMessage { .. } => {
                StatusCode::BAD_REQUEST
            }
            RelayError::BotNotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::BotInactive(_) => StatusCode::FORBIDDEN,
            RelayError::WebhookStatus { .. } => StatusCode::BAD_GATEWAY,
            RelayError::NotConfigured | RelayError::LookupStatus(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON error envelope returned to the caller.
    pub fn body(&self, options: &RelayOptions) -> Value {
        match self {
            RelayError::MethodNotAllowed => json!({ "error": "Method not allowed. Use POST." }),
            RelayError::MissingBotId { received } => {
                json!({ "error": "botId is required", "received": received })
            }
            RelayError::MissingMessage { received } => {
                json!({ "error": "message is required", "received": received })
            }
            RelayError::NotConfigured => json!({
                "error": "Server configuration error",
                "details": "Supabase credentials not configured",
            }),
            RelayError::LookupStatus(status) => json!({
                "error": "Database query failed",
                "status": status,
            }),
            RelayError::BotNotFound { bot_id, table } => json!({
                "error": "Bot not found",
                "botId": bot_id,
                "hint": format!("Check if bot_id exists in {table} table"),
            }),
            RelayError::BotInactive(bot_id) => json!({
                "error": "Bot is inactive",
                "botId": bot_id,
            }),
            RelayError::WebhookStatus {
                status,
                webhook_url,
            } => {
                let mut body = json!({
                    "error": "Webhook call failed",
                    "status": status,
                });
                if options.expose_webhook_url {
                    body["webhookUrl"] = Value::String(webhook_url.clone());
                }
                body
            }
            RelayError::Internal(err) => {
                let mut body = json!({
                    "error": "Internal server error",
                    "details": format!("{err:#}"),
                });
                if options.dev_mode {
                    body["stack"] = Value::String(format!("{err:?}"));
                }
                body
            }
        }
    }
}

/// Validated inbound chat message: the two required fields plus everything
/// else the caller sent, all kept verbatim for the webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub bot_id: Value,
    pub message: Value,
    pub extra: Map<String, Value>,
}

impl InboundMessage {
    pub fn from_json(body: Value) -> Result<Self, RelayError> {
        let Value::Object(mut fields) = body.clone() else {
            return Err(RelayError::MissingBotId { received: body });
        };
        let Some(bot_id) = fields.remove("botId").filter(is_present) else {
            return Err(RelayError::MissingBotId { received: body });
        };
        let Some(message) = fields.remove("message").filter(is_present) else {
            return Err(RelayError::MissingMessage { received: body });
        };
        Ok(Self {
            bot_id,
            message,
            extra: fields,
        })
    }

    /// Text form of the bot id used to filter the lookup table.
    pub fn lookup_key(&self) -> String {
        match &self.bot_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// `null`, `false`, zero and the empty string count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Outcome of one relay invocation. `body` is `None` for preflight replies.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: StatusCode,
    pub body: Option<Value>,
}

/// Resolves a bot's webhook and forwards inbound messages to it.
#[derive(Clone)]
pub struct Relay {
    directory: Option<Arc<dyn BotDirectory>>,
    webhooks: WebhookClient,
    options: RelayOptions,
}

impl Relay {
    pub fn new(
        directory: Option<Arc<dyn BotDirectory>>,
        webhooks: WebhookClient,
        options: RelayOptions,
    ) -> Self {
        Self {
            directory,
            webhooks,
            options,
        }
    }

    pub async fn handle(&self, method: &Method, headers: &HeaderMap, body: &[u8]) -> RelayReply {
        if method == Method::OPTIONS {
            debug!("preflight request handled");
            return RelayReply {
                status: StatusCode::OK,
                body: None,
            };
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        let span = tracing::info_span!(
            "relay",
            request_id = %uuid::Uuid::new_v4(),
            %method,
            %origin,
            bot_id = tracing::field::Empty,
        );

        async {
            match self.relay(method, body).await {
                Ok(data) => RelayReply {
                    status: StatusCode::OK,
                    body: Some(data),
                },
                Err(err) => {
                    let status = err.status();
                    if status.is_server_error() {
                        error!(%status, error = %err, "relay failed");
                    } else {
                        warn!(%status, error = %err, "relay rejected");
                    }
                    RelayReply {
                        status,
                        body: Some(err.body(&self.options)),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn relay(&self, method: &Method, body: &[u8]) -> Result<Value, RelayError> {
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed);
        }

        let body: Value =
            serde_json::from_slice(body).context("request body is not valid JSON")?;
        let inbound = InboundMessage::from_json(body)?;
        let lookup_key = inbound.lookup_key();
        tracing::Span::current().record("bot_id", lookup_key.as_str());
        info!("received relay request");

        let directory = self.directory.as_ref().ok_or(RelayError::NotConfigured)?;
        let record = directory
            .find_bot(&lookup_key)
            .await
            .map_err(|err| match err {
                LookupError::Status(status) => RelayError::LookupStatus(status),
                other => RelayError::Internal(anyhow::Error::new(other)),
            })?;
        let Some(record) = record else {
            return Err(RelayError::BotNotFound {
                bot_id: inbound.bot_id,
                table: directory.table().to_string(),
            });
        };
        if !record.is_active() {
            return Err(RelayError::BotInactive(inbound.bot_id));
        }
        let webhook_url = record
            .webhook_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("bot record has no webhook_url"))?;
        debug!(%webhook_url, "forwarding message");

        let payload = build_payload(&inbound.message, &inbound.bot_id, &inbound.extra);
        let data = self
            .webhooks
            .forward(&webhook_url, &payload)
            .await
            .map_err(|err| match err {
                ForwardError::Status(status) => RelayError::WebhookStatus {
                    status,
                    webhook_url: webhook_url.clone(),
                },
                other => RelayError::Internal(anyhow::Error::new(other)),
            })?;
        info!("webhook response received");

        Ok(json!({
            "success": true,
            "data": data,
            "botId": inbound.bot_id,
        }))
    }
}
