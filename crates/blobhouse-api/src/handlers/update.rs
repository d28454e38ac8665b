//! Append endpoint: `POST /update?key=<field>`.
//!
//! The request body is newline-delimited records. It is spooled to a temp
//! file (with a final LF added if the body lacks one), appended to the blob
//! file, and indexed with a field extractor for the given key. A failed
//! append truncates the blob back, so an error response means the blob is
//! unchanged.

use std::io::Write;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use blobhouse_storage::{append, FieldExtractor, Result};

use crate::models::UpdateResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    /// Top-level JSON field to index the new records by.
    pub key: Option<String>,
}

#[utoipa::path(
    post,
    path = "/update",
    params(("key" = String, Query, description = "Top-level JSON field holding the record key")),
    request_body(content = String, description = "Newline-delimited records"),
    responses(
        (status = 200, description = "Records appended and indexed", body = UpdateResponse),
        (status = 400, description = "Missing key parameter, or the append failed")
    ),
    tag = "update"
)]
pub async fn update(
    State(state): State<AppState>,
    Query(params): Query<UpdateParams>,
    body: Bytes,
) -> Response {
    let Some(field) = params.key.filter(|k| !k.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "update: key query parameter required",
        )
            .into_response();
    };

    let needs_newline = !body.is_empty() && !body.ends_with(b"\n");
    let appended_bytes = body.len() as u64 + u64::from(needs_newline);

    let blob_path = state.blob_path.clone();
    let store = state.store.clone();
    let batch_size = state.batch_size;
    let ignore_missing_keys = state.ignore_missing_keys;

    let result = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut spool = tempfile::NamedTempFile::new()?;
        spool.write_all(&body)?;
        if needs_newline {
            spool.write_all(b"\n")?;
        }
        spool.flush()?;

        let extractor = FieldExtractor::new(field);
        append(
            &blob_path,
            Some(spool.path()),
            &extractor,
            store.as_ref(),
            batch_size,
            ignore_missing_keys,
        )
    })
    .await;

    match result {
        Ok(Ok(indexed)) => Json(UpdateResponse {
            indexed,
            appended_bytes,
        })
        .into_response(),
        Ok(Err(err)) => {
            tracing::warn!("append failed: {err}");
            (StatusCode::BAD_REQUEST, format!("append: {err}")).into_response()
        }
        Err(err) => {
            tracing::error!("append task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
