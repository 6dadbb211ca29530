//! In-process stand-ins for the Supabase REST API and webhook destinations.

use crate::config::LookupConfig;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_TABLE: &str = "bot_configurations";

#[derive(Default)]
struct Recorded {
    bots: Mutex<HashMap<String, Value>>,
    webhook_calls: AtomicUsize,
    last_payload: Mutex<Option<Value>>,
}

#[derive(Clone)]
pub struct MockUpstream {
    addr: SocketAddr,
    recorded: Arc<Recorded>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let recorded = Arc::new(Recorded::default());
        let app = Router::new()
            .route("/rest/v1/{table}", get(query_table))
            .route("/hook/ok", post(hook_ok))
            .route("/hook/echo", post(hook_echo))
            .route("/hook/fail", post(hook_fail))
            .route("/hook/text", post(hook_text))
            .route("/hook/slow", post(hook_slow))
            .with_state(recorded.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, recorded }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn insert_bot(&self, bot_id: &str, webhook_url: &str, is_active: bool) {
        self.insert_row(
            bot_id,
            json!({ "webhook_url": webhook_url, "is_active": is_active }),
        );
    }

    pub fn insert_row(&self, bot_id: &str, row: Value) {
        self.recorded
            .bots
            .lock()
            .unwrap()
            .insert(bot_id.to_string(), row);
    }

    pub fn webhook_calls(&self) -> usize {
        self.recorded.webhook_calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.recorded.last_payload.lock().unwrap().clone()
    }
}

pub fn lookup_config(upstream: &MockUpstream) -> LookupConfig {
    LookupConfig {
        base_url: upstream.url("/").parse().unwrap(),
        api_key: TEST_API_KEY.to_string(),
        table: TEST_TABLE.to_string(),
        timeout: Duration::from_secs(5),
    }
}

async fn query_table(
    State(recorded): State<Arc<Recorded>>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let bearer = format!("Bearer {TEST_API_KEY}");
    let authorized = headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(TEST_API_KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str());
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if table != TEST_TABLE {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if params.get("select").map(String::as_str) != Some("webhook_url,is_active") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Some(bot_id) = params.get("bot_id").and_then(|f| f.strip_prefix("eq.")) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let rows: Vec<Value> = recorded
        .bots
        .lock()
        .unwrap()
        .get(bot_id)
        .cloned()
        .into_iter()
        .collect();
    Json(rows).into_response()
}

fn record_call(recorded: &Recorded, payload: &Value) {
    recorded.webhook_calls.fetch_add(1, Ordering::SeqCst);
    *recorded.last_payload.lock().unwrap() = Some(payload.clone());
}

async fn hook_ok(State(recorded): State<Arc<Recorded>>, Json(payload): Json<Value>) -> Json<Value> {
    record_call(&recorded, &payload);
    Json(json!({ "ok": true }))
}

async fn hook_echo(
    State(recorded): State<Arc<Recorded>>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    record_call(&recorded, &payload);
    Json(payload)
}

async fn hook_fail(State(recorded): State<Arc<Recorded>>, Json(payload): Json<Value>) -> StatusCode {
    record_call(&recorded, &payload);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn hook_text(State(recorded): State<Arc<Recorded>>, Json(payload): Json<Value>) -> &'static str {
    record_call(&recorded, &payload);
    "workflow started"
}

async fn hook_slow(State(recorded): State<Arc<Recorded>>, Json(payload): Json<Value>) -> Json<Value> {
    record_call(&recorded, &payload);
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "ok": true }))
}
