//! API route definitions.

use super::state::AppState;
use crate::{storage, usage};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/usage/today", get(usage_today))
        .route("/usage/history", get(usage_history))
        .route("/speedtest/history", get(speedtest_history))
        .route("/scan/latest", get(scan_latest))
        .route("/network/status", get(network_status))
}

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "data": data,
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("api query failed: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "query failed".to_string())
}

async fn health() -> Json<Value> {
    envelope(json!({ "status": "ok" }))
}

async fn usage_today(State(state): State<AppState>) -> ApiResult {
    let date = usage::today_key();
    let row = usage::usage_for_date(&state.pool, &date).map_err(internal)?;
    let limit_mb = usage::daily_limit_mb(&state.pool).map_err(internal)?;

    let (wifi, mobile) = row
        .map(|u| (u.wifi_bytes, u.mobile_bytes))
        .unwrap_or((0, 0));
    Ok(envelope(json!({
        "date": date,
        "wifi_bytes": wifi,
        "mobile_bytes": mobile,
        "wifi_pretty": usage::format_bytes(wifi),
        "mobile_pretty": usage::format_bytes(mobile),
        "limit_mb": limit_mb,
    })))
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn usage_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult {
    let rows = usage::history(&state.pool, params.days).map_err(internal)?;
    let total = rows.len();
    Ok(envelope(json!({
        "days": rows,
        "total": total,
    })))
}

async fn speedtest_history(State(state): State<AppState>) -> ApiResult {
    let rows = storage::speedtest_history(&state.pool, 20).map_err(internal)?;
    let total = rows.len();
    Ok(envelope(json!({
        "tests": rows,
        "total": total,
    })))
}

async fn scan_latest(State(state): State<AppState>) -> ApiResult {
    let latest = storage::latest_scan(&state.pool).map_err(internal)?;
    Ok(envelope(latest.unwrap_or(Value::Null)))
}

async fn network_status() -> Json<Value> {
    let status = crate::netinfo::status();
    envelope(serde_json::to_value(status).unwrap_or(Value::Null))
}
