use crate::server::AppState;
use crate::widget::{PublishedConfig, loader_script};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

pub async fn relay_message(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let reply = state.relay.handle(&method, &headers, &body).await;
    match reply.body {
        Some(body) => (reply.status, Json(body)).into_response(),
        None => reply.status.into_response(),
    }
}

pub async fn serve_loader(State(state): State<AppState>) -> impl IntoResponse {
    let published = state
        .config
        .lookup
        .as_ref()
        .map(PublishedConfig::from_lookup);
    javascript(loader_script(&state.config.widget, published.as_ref()))
}

pub async fn serve_chat_widget(State(state): State<AppState>) -> Response {
    let path = state.config.widget.asset_dir.join("chat-widget.js");
    match tokio::fs::read(&path).await {
        Ok(script) => javascript(script),
        Err(err) => {
            tracing::warn!(?path, ?err, "chat widget asset not available");
            (StatusCode::NOT_FOUND, "chat-widget.js not found").into_response()
        }
    }
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

fn javascript(script: impl Into<axum::body::Body>) -> Response {
    let mut resp = Response::new(script.into());
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    resp
}
