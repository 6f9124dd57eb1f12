//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::detect::threshold::assess_labelled;
use crate::detect::{self, MonitoringWindow};
use crate::source::SeriesPayload;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/verdicts", get(list_verdicts))
        .route("/verdicts/{window}", get(window_verdicts))
        .route("/evaluate", post(evaluate))
        .route("/classify", post(classify))
        .route("/policy", get(policy))
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": { "message": message.into() } })))
}

fn parse_window(raw: Option<&str>) -> Result<MonitoringWindow, (StatusCode, Json<Value>)> {
    match raw {
        None => Ok(MonitoringWindow::default()),
        Some(s) => s
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e)),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_verdicts(State(state): State<AppState>) -> Json<Value> {
    let snapshots = state.board.all().await;
    Json(json!({ "data": snapshots, "meta": { "total": snapshots.len() } }))
}

async fn window_verdicts(State(state): State<AppState>, Path(window): Path<String>) -> ApiResult {
    let window = parse_window(Some(window.as_str()))?;
    match state.board.latest(window).await {
        Some(snapshot) => Ok(Json(json!({ "data": snapshot }))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no verdicts for {} yet", window),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    window: Option<String>,
}

async fn evaluate(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
    Json(payload): Json<SeriesPayload>,
) -> ApiResult {
    let window = parse_window(query.window.as_deref())?;
    let series = payload.into_series();
    let verdicts = detect::evaluate(&series, &state.policy.for_window(window));
    let abnormal = verdicts.iter().filter(|v| !v.is_normal).count();
    tracing::debug!(%window, entities = verdicts.len(), abnormal, "on-demand evaluation");

    Ok(Json(json!({
        "data": verdicts,
        "meta": { "window": window, "total": series.len(), "abnormal": abnormal }
    })))
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    category: String,
    values: Vec<i64>,
    latest: Option<i64>,
    window: Option<String>,
}

async fn classify(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> ApiResult {
    let window = parse_window(req.window.as_deref())?;
    let latest = match (req.latest, req.values.last()) {
        (Some(latest), _) => latest,
        (None, Some(&last)) => last,
        (None, None) => 0,
    };
    let assessment = assess_labelled(&req.values, latest, &req.category, &state.policy.for_window(window));
    Ok(Json(json!({ "data": assessment, "meta": { "window": window } })))
}

async fn policy(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.policy }))
}
