use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::api::middleware::{request_id::RequestId, state::AppState};
use crate::db::PoolStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub pod_name: String,
    pub version: String,
    pub environment: String,
    pub port: u16,
    pub account_service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextResponse {
    pub request_id: String,
    pub deadline_ms: u64,
}

/// Health check endpoint
/// Returns 200 if the database and the account service are reachable, 503 otherwise
pub async fn health_check(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
) -> (StatusCode, Json<HealthResponse>) {
    let start = Instant::now();
    let ctx = state.request_context(request_id);

    let healthy = state.service.health_check(&ctx).await.is_ok();

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    tracing::info!(
        status = %response.status,
        duration_ms = start.elapsed().as_millis(),
        "Health check completed"
    );

    (status_code, Json(response))
}

/// Liveness endpoint, answers as long as the process serves requests
pub async fn live() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "true".to_string(),
    })
}

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        pod_name: state.config.pod_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        port: state.config.port,
        account_service: state.config.account_service.name.clone(),
    })
}

/// Echoes the request headers, grouped by name.
pub async fn header(
    RequestId(request_id): RequestId,
    headers: HeaderMap,
) -> Json<BTreeMap<String, Vec<String>>> {
    tracing::info!(request_id = %request_id, "Header");

    let mut echoed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        echoed
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    Json(echoed)
}

/// The context a handler would run the request under.
pub async fn context(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
) -> Json<ContextResponse> {
    let ctx = state.request_context(request_id);

    Json(ContextResponse {
        deadline_ms: ctx.remaining().as_millis() as u64,
        request_id: ctx.request_id,
    })
}

pub async fn stat(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.service.stat())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/live", get(live))
        .route("/info", get(info))
        .route("/stat", get(stat))
        .route("/header", get(header))
        .route("/context", get(context))
}
