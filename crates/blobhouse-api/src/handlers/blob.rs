//! Record serving: `GET /{key}` and the legacy `GET /blob?{key}` route.

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use blobhouse_storage::Error;

use crate::AppState;

/// Serve the record stored under the path key.
#[utoipa::path(
    get,
    path = "/{key}",
    params(("key" = String, Path, description = "Record key")),
    responses(
        (status = 200, description = "Raw record bytes", body = String),
        (status = 404, description = "Key not found"),
        (status = 500, description = "Corrupt index entry or read failure")
    ),
    tag = "blob"
)]
pub async fn get_blob(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    serve_key(state, key).await
}

/// Legacy route carrying the key as the raw query string, `/blob?mykey`.
///
/// Query components often carry identifying information as `key=value`
/// pairs; this route predates the path form and treats the whole query
/// string as the key.
#[utoipa::path(
    get,
    path = "/blob",
    responses(
        (status = 200, description = "Raw record bytes", body = String),
        (status = 400, description = "Missing key"),
        (status = 404, description = "Key not found")
    ),
    tag = "blob"
)]
pub async fn get_blob_legacy(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    match query.filter(|q| !q.is_empty()) {
        Some(key) => serve_key(state, key).await,
        None => (StatusCode::BAD_REQUEST, "key is required").into_response(),
    }
}

async fn serve_key(state: AppState, key: String) -> Response {
    let lookup = state.lookup.clone();
    let result = tokio::task::spawn_blocking(move || lookup.get(&key)).await;

    match result {
        Ok(Ok(bytes)) => bytes.into_response(),
        Ok(Err(err @ Error::KeyNotFound(_))) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Ok(Err(err)) => {
            tracing::error!("lookup failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!("lookup task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
