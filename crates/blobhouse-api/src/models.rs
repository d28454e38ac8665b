//! API models for the HTTP endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub stats: String,
    pub docs: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Requests answered with a non-error status.
    pub ok: u64,
    /// Requests answered with a 4xx or 5xx status.
    pub err: u64,
    /// Duration of the most recent request, in seconds.
    pub last_response_seconds: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateResponse {
    /// Entries written into the index.
    pub indexed: u64,
    /// Bytes appended to the blob file, trailing LF included.
    pub appended_bytes: u64,
}
