//! blobhouse HTTP API
//!
//! Serves records by key, accepts appends, and exposes stats:
//!
//! - `GET /{key}` — record bytes (preferred route)
//! - `GET /blob?{key}` — legacy route, raw query string as key
//! - `POST /update?key=<field>` — append newline-delimited records
//! - `GET /count`, `GET /stats`, `GET /` — index size, request counters,
//!   server info
//! - `/swagger-ui` — interactive API docs
//!
//! Storage calls are blocking (positional file reads, RocksDB); handlers
//! hop onto the blocking pool for them so the HTTP runtime stays free.

use std::path::PathBuf;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use blobhouse_storage::{IndexStore, LookupService};

pub mod handlers;
pub mod metrics;
pub mod models;

pub use metrics::RequestMetrics;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Key → record bytes, composed over the store and the blob reader.
    pub lookup: Arc<LookupService>,
    /// The index store, for appends and count.
    pub store: Arc<dyn IndexStore>,
    /// Blob file the update endpoint appends to.
    pub blob_path: PathBuf,
    /// Records per batch for appends triggered over HTTP.
    pub batch_size: usize,
    /// Skip records without an extractable key during appends.
    pub ignore_missing_keys: bool,
    /// Request counters backing `/stats`.
    pub metrics: Arc<RequestMetrics>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::blob::get_blob,
        handlers::blob::get_blob_legacy,
        handlers::update::update,
        handlers::stats::root,
        handlers::stats::count,
        handlers::stats::stats,
    ),
    components(schemas(
        models::ServerInfo,
        models::CountResponse,
        models::StatsResponse,
        models::UpdateResponse,
    ))
)]
struct ApiDoc;

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let swagger = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    Router::new()
        .route("/", get(handlers::stats::root))
        .route("/stats", get(handlers::stats::stats))
        .route("/count", get(handlers::stats::count))
        .route("/update", post(handlers::update::update))
        .route("/blob", get(handlers::blob::get_blob_legacy)) // Legacy route.
        .route("/:key", get(handlers::blob::get_blob)) // Preferred.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics::track,
        ))
        .merge(swagger)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
