use crate::config::{LookupConfig, WidgetConfig};
use serde::Serialize;

/// Values published to `window.SUPABASE_CONFIG` for the chat widget.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedConfig {
    pub url: String,
    pub anon_key: String,
}

impl PublishedConfig {
    pub fn from_lookup(lookup: &LookupConfig) -> Self {
        Self {
            url: lookup.base_url.as_str().trim_end_matches('/').to_string(),
            anon_key: lookup.api_key.clone(),
        }
    }
}

const LOADER_TEMPLATE: &str = r#"// Chat widget loader
(function (global) {
  const currentScript = document.currentScript || (function () {
    const scripts = document.getElementsByTagName("script");
    return scripts[scripts.length - 1];
  })();

  global.SUPABASE_CONFIG = __PUBLISHED_CONFIG__;

  const SDK_URL = __SDK_URL__;
  const SDK_TIMEOUT_MS = __SDK_TIMEOUT_MS__;

  function reportError(reason) {
    console.error("ChatWidget:", reason);
    global.dispatchEvent(new CustomEvent("chat-widget:error", { detail: { reason: String(reason) } }));
  }

  function ensureSdk() {
    if (global.supabase) {
      return Promise.resolve();
    }
    return new Promise(function (resolve, reject) {
      const script = document.createElement("script");
      const timer = setTimeout(function () {
        reject(new Error("timed out loading " + SDK_URL));
      }, SDK_TIMEOUT_MS);
      script.src = SDK_URL;
      script.onload = function () {
        clearTimeout(timer);
        resolve();
      };
      script.onerror = function () {
        clearTimeout(timer);
        reject(new Error("failed to load " + SDK_URL));
      };
      document.head.appendChild(script);
    });
  }

  function injectWidget() {
    const scriptUrl = new URL(currentScript.src);
    const basePath =
      scriptUrl.origin + scriptUrl.pathname.substring(0, scriptUrl.pathname.lastIndexOf("/") + 1);
    const botId = scriptUrl.searchParams.get("botId");

    const widgetScript = document.createElement("script");
    widgetScript.src = `${basePath}chat-widget.js?botId=${botId}`;
    document.body.appendChild(widgetScript);
  }

  (async function () {
    try {
      await ensureSdk();
    } catch (err) {
      reportError(err && err.message ? err.message : err);
      return;
    }
    injectWidget();
  })();
})(window);
"#;

/// Render the embeddable loader script for the given configuration.
pub fn loader_script(widget: &WidgetConfig, published: Option<&PublishedConfig>) -> String {
    let published = serde_json::to_string(&published).unwrap_or_else(|_| "null".to_string());
    let sdk_url = serde_json::Value::String(widget.sdk_url.clone()).to_string();
    LOADER_TEMPLATE
        .replace("__PUBLISHED_CONFIG__", &published)
        .replace("__SDK_URL__", &sdk_url)
        .replace("__SDK_TIMEOUT_MS__", &widget.sdk_timeout.as_millis().to_string())
}
