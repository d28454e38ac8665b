//! Request counters behind the `/stats` endpoint.
//!
//! A single middleware layer times every request, counts ok vs error
//! responses, and stamps the server version header on the way out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::models::StatsResponse;
use crate::AppState;

pub const VERSION_HEADER: &str = "x-blobhouse-version";

#[derive(Default)]
pub struct RequestMetrics {
    ok: AtomicU64,
    err: AtomicU64,
    /// `f64` seconds stored as raw bits.
    last_response_seconds: AtomicU64,
}

impl RequestMetrics {
    pub fn record(&self, status: StatusCode, seconds: f64) {
        if status.is_client_error() || status.is_server_error() {
            self.err.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ok.fetch_add(1, Ordering::Relaxed);
        }
        self.last_response_seconds
            .store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsResponse {
        StatsResponse {
            ok: self.ok.load(Ordering::Relaxed),
            err: self.err.load(Ordering::Relaxed),
            last_response_seconds: f64::from_bits(
                self.last_response_seconds.load(Ordering::Relaxed),
            ),
        }
    }
}

/// Times the request, updates the counters, and tags the response with the
/// server version.
pub async fn track(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;
    state
        .metrics
        .record(response.status(), started.elapsed().as_secs_f64());
    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}
