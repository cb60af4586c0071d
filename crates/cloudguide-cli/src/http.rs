//! HTTP surface over the router and ingestor units.
//!
//! - `GET /healthz`
//! - `GET|POST|OPTIONS /api/ask`: plain-text answer with an `X-Source` header
//! - `GET|POST|OPTIONS /api/ingest`: queue a document, `202 queued`
//!
//! Every API response carries permissive CORS headers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use cloudguide_core::FinalAnswer;
use cloudguide_runtime::{CloudGuideRuntime, IngestorHandle, RouterHandle, RuntimeError};

const X_SOURCE: HeaderName = HeaderName::from_static("x-source");
const HTTP_USER: &str = "http";

#[derive(Clone)]
pub struct AppState {
    pub router: RouterHandle,
    pub ingestor: IngestorHandle,
    pub http_timeout: Duration,
}

impl AppState {
    pub fn from_runtime(runtime: &CloudGuideRuntime) -> Self {
        Self {
            router: runtime.router().clone(),
            ingestor: runtime.ingestor().clone(),
            http_timeout: runtime.config().timeouts.http_to_router,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/ask", get(ask_get).post(ask_post).options(preflight))
        .route(
            "/api/ingest",
            get(ingest_get).post(ingest_post).options(preflight),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `bind` and serve until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down HTTP server");
        })
        .await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn preflight() -> Response {
    with_cors(StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
struct AskParams {
    text: Option<String>,
}

async fn ask_get(State(state): State<AppState>, Query(params): Query<AskParams>) -> Response {
    match params.text {
        Some(text) => answer(&state, text).await,
        None => with_cors(StatusCode::BAD_REQUEST, "missing text parameter"),
    }
}

async fn ask_post(State(state): State<AppState>, body: String) -> Response {
    answer(&state, text_from_body(body)).await
}

async fn answer(state: &AppState, text: String) -> Response {
    match route(&state.router, HTTP_USER, text, state.http_timeout).await {
        Ok(answer) => {
            info!(source = %answer.source, text = %answer.text, "HTTP final answer");
            let mut response = with_cors(StatusCode::OK, answer.text);
            response
                .headers_mut()
                .insert(X_SOURCE, HeaderValue::from_static(answer.source.as_str()));
            response
        }
        Err((status, message)) => with_cors(status, message),
    }
}

pub const UNAVAILABLE: &str = "CloudGuide is unavailable, please try again later.";

pub fn timed_out(timeout: Duration) -> String {
    format!("No answer within {}s, please try again.", timeout.as_secs())
}

/// Ask the router, turning a dead router or an expired deadline into the
/// status and text shown to the user.
pub async fn route(
    router: &RouterHandle,
    user: &str,
    text: String,
    timeout: Duration,
) -> std::result::Result<FinalAnswer, (StatusCode, String)> {
    match tokio::time::timeout(timeout, router.ask(user, text)).await {
        Ok(Ok(answer)) => Ok(answer),
        Ok(Err(e)) => {
            error!(user, error = %e, "Router unavailable");
            Err((StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE.to_string()))
        }
        Err(_) => {
            warn!(user, timeout = ?timeout, "Router did not answer in time");
            Err((StatusCode::GATEWAY_TIMEOUT, timed_out(timeout)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestParams {
    #[serde(rename = "docId")]
    doc_id: Option<String>,
    path: Option<String>,
}

async fn ingest_get(State(state): State<AppState>, Query(params): Query<IngestParams>) -> Response {
    let Some(doc_id) = params.doc_id.filter(|id| !id.trim().is_empty()) else {
        return with_cors(StatusCode::BAD_REQUEST, "missing docId");
    };
    match existing_file(params.path.as_deref().unwrap_or_default()).await {
        Some(path) => queue(&state, doc_id, path).await,
        None => with_cors(StatusCode::BAD_REQUEST, "invalid or missing file"),
    }
}

async fn ingest_post(State(state): State<AppState>, body: String) -> Response {
    let json: JsonValue = serde_json::from_str(&body).unwrap_or(JsonValue::Null);
    let doc_id = str_field(&json, "docId");
    let path = existing_file(str_field(&json, "path")).await;
    match path {
        Some(path) if !doc_id.trim().is_empty() => queue(&state, doc_id.to_string(), path).await,
        _ => with_cors(StatusCode::BAD_REQUEST, "invalid docId or file path"),
    }
}

async fn queue(state: &AppState, doc_id: String, path: PathBuf) -> Response {
    match state.ingestor.submit_file(doc_id.clone(), path.clone()).await {
        Ok(()) => {
            info!(doc_id = %doc_id, path = %path.display(), "Ingestion queued");
            with_cors(StatusCode::ACCEPTED, "queued")
        }
        Err(RuntimeError::UnsupportedFile(_)) => with_cors(
            StatusCode::BAD_REQUEST,
            "unsupported file type (use .txt, .md or .json)",
        ),
        Err(e) => {
            error!(doc_id = %doc_id, error = %e, "Ingestion could not be queued");
            with_cors(StatusCode::SERVICE_UNAVAILABLE, "ingestor unavailable")
        }
    }
}

fn with_cors(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
        body.into(),
    )
        .into_response()
}

fn str_field<'a>(json: &'a JsonValue, key: &str) -> &'a str {
    json.get(key).and_then(JsonValue::as_str).unwrap_or_default()
}

/// The `text` field of a JSON body, or the whole body.
fn text_from_body(body: String) -> String {
    serde_json::from_str::<JsonValue>(&body)
        .ok()
        .and_then(|json| json.get("text").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or(body)
}

/// Resolve `~/` against the home directory. Blank paths resolve to nothing.
pub fn expand_home(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

async fn existing_file(raw: &str) -> Option<PathBuf> {
    let path = expand_home(raw)?;
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Some(path),
        _ => None,
    }
}
