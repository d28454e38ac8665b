//! Server info, key count, and request stats endpoints.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::models::{CountResponse, ServerInfo, StatsResponse};
use crate::AppState;

/// Server info with links to the other endpoints.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Server info", body = ServerInfo)),
    tag = "stats"
)]
pub async fn root(headers: HeaderMap) -> Json<ServerInfo> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    Json(ServerInfo {
        name: "blobhouse".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stats: format!("http://{host}/stats"),
        docs: format!("http://{host}/swagger-ui"),
    })
}

/// Number of keys in the index, for stores that can tell.
#[utoipa::path(
    get,
    path = "/count",
    responses(
        (status = 200, description = "Key count", body = CountResponse),
        (status = 404, description = "Store has no count capability")
    ),
    tag = "stats"
)]
pub async fn count(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.count()).await;

    match result {
        Ok(Ok(Some(count))) => Json(CountResponse { count }).into_response(),
        Ok(Ok(None)) => (StatusCode::NOT_FOUND, "not implemented").into_response(),
        Ok(Err(err)) => {
            tracing::error!("count failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!("count task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Request counters and the last response time.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Request stats", body = StatsResponse)),
    tag = "stats"
)]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.metrics.snapshot())
}
