use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SDK_URL: &str = "https://cdn.jsdelivr.net/npm/@supabase/supabase-js@2";

/// Runtime configuration for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Supabase project used to resolve bot records. `None` when either the
    /// URL or the key is missing; the relay then answers with a configuration
    /// error instead of refusing to start.
    pub lookup: Option<LookupConfig>,
    pub relay: RelayOptions,
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    pub base_url: url::Url,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayOptions {
    /// Include stack information in internal error responses.
    pub dev_mode: bool,
    /// Echo the destination URL back to callers when the webhook fails.
    pub expose_webhook_url: bool,
    pub webhook_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub sdk_url: String,
    pub sdk_timeout: Duration,
    pub asset_dir: PathBuf,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            dev_mode: false,
            expose_webhook_url: true,
            webhook_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            sdk_url: DEFAULT_SDK_URL.to_string(),
            sdk_timeout: Duration::from_secs(10),
            asset_dir: PathBuf::from("assets"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_vars<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(get);

        let bind_addr: SocketAddr = vars
            .non_empty("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let lookup_timeout = vars.millis("LOOKUP_TIMEOUT_MS", Duration::from_secs(10))?;
        let lookup = match (
            vars.non_empty("SUPABASE_URL"),
            vars.non_empty("SUPABASE_ANON_KEY"),
        ) {
            (Some(url), Some(api_key)) => Some(LookupConfig {
                base_url: url.parse().context("failed to parse SUPABASE_URL")?,
                api_key,
                table: vars
                    .non_empty("BOT_TABLE")
                    .unwrap_or_else(|| "bot_configurations".to_string()),
                timeout: lookup_timeout,
            }),
            _ => None,
        };

        let env_name = vars
            .non_empty("RELAY_ENV")
            .or_else(|| vars.non_empty("NODE_ENV"))
            .unwrap_or_else(|| "production".to_string());
        let relay = RelayOptions {
            dev_mode: is_development(&env_name),
            expose_webhook_url: vars
                .non_empty("RELAY_EXPOSE_WEBHOOK_URL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            webhook_timeout: vars.millis("WEBHOOK_TIMEOUT_MS", Duration::from_secs(30))?,
        };

        let widget = WidgetConfig {
            sdk_url: vars
                .non_empty("WIDGET_SDK_URL")
                .unwrap_or_else(|| DEFAULT_SDK_URL.to_string()),
            sdk_timeout: vars.millis("WIDGET_SDK_TIMEOUT_MS", Duration::from_secs(10))?,
            asset_dir: PathBuf::from(
                vars.non_empty("WIDGET_ASSET_DIR")
                    .unwrap_or_else(|| "assets".to_string()),
            ),
        };

        Ok(Self {
            bind_addr,
            lookup,
            relay,
            widget,
        })
    }
}

fn is_development(env_name: &str) -> bool {
    env_name.eq_ignore_ascii_case("development") || env_name.eq_ignore_ascii_case("dev")
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn millis(&self, key: &str, default: Duration) -> anyhow::Result<Duration> {
        match self.non_empty(key) {
            Some(raw) => {
                let ms = raw
                    .parse::<u64>()
                    .with_context(|| format!("failed to parse {key}"))?;
                Ok(Duration::from_millis(ms))
            }
            None => Ok(default),
        }
    }
}
