use crate::api;
use crate::config::AppConfig;
use crate::forward::WebhookClient;
use crate::lookup::{BotDirectory, SupabaseDirectory};
use crate::relay::Relay;
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{any, get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let directory = config.lookup.clone().map(|lookup| {
            Arc::new(SupabaseDirectory::new(lookup, client.clone())) as Arc<dyn BotDirectory>
        });
        if directory.is_none() {
            tracing::warn!("SUPABASE_URL or SUPABASE_ANON_KEY not set; relay requests will fail");
        }
        let webhooks = WebhookClient::new(client, config.relay.webhook_timeout);
        let relay = Relay::new(directory, webhooks, config.relay.clone());
        Ok(Self { config, relay })
    }
}

pub fn router(state: AppState) -> Router {
    let relay_routes = Router::new()
        .route("/api/webhook", any(api::relay_message))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ));

    Router::new()
        .route("/embed.js", get(api::serve_loader))
        .route("/chat-widget.js", get(api::serve_chat_widget))
        .route("/healthz", get(api::healthz))
        .merge(relay_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
