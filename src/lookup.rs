use crate::config::LookupConfig;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const SELECTED_COLUMNS: &str = "webhook_url,is_active";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup service returned status {0}")]
    Status(u16),
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A bot configuration row as projected by the lookup query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotRecord {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl BotRecord {
    /// A missing or null flag counts as inactive.
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(false)
    }
}

/// Read-only source of bot configuration records.
#[async_trait]
pub trait BotDirectory: Send + Sync {
    /// Returns the first record matching `bot_id`, if any.
    async fn find_bot(&self, bot_id: &str) -> Result<Option<BotRecord>, LookupError>;

    /// Name of the table records are read from, used in remediation hints.
    fn table(&self) -> &str;
}

/// Queries a Supabase project through its PostgREST interface.
#[derive(Clone)]
pub struct SupabaseDirectory {
    cfg: LookupConfig,
    client: reqwest::Client,
}

impl SupabaseDirectory {
    pub fn new(cfg: LookupConfig, client: reqwest::Client) -> Self {
        Self { cfg, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.cfg.base_url.as_str().trim_end_matches('/'),
            self.cfg.table
        )
    }
}

#[async_trait]
impl BotDirectory for SupabaseDirectory {
    async fn find_bot(&self, bot_id: &str) -> Result<Option<BotRecord>, LookupError> {
        let filter = format!("eq.{bot_id}");
        let resp = self
            .client
            .get(self.endpoint())
            .query(&[("bot_id", filter.as_str()), ("select", SELECTED_COLUMNS)])
            .header("apikey", &self.cfg.api_key)
            .bearer_auth(&self.cfg.api_key)
            .timeout(self.cfg.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let rows: Vec<BotRecord> = resp.json().await?;
        debug!(%bot_id, rows = rows.len(), "bot lookup completed");
        Ok(rows.into_iter().next())
    }

    fn table(&self) -> &str {
        &self.cfg.table
    }
}
