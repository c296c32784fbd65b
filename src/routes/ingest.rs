//! Data point submission endpoint.
//!
//! Internal to this file: the request body type and handler. Exported to
//! the gateway: a subrouter with the `POST /projects/{slug}/data` route.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::AppState;
use crate::{points, registry, AggregationJob, ApiError};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/projects/{slug}/data", post(handler))
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    // ---
    api_key: String,
    fields: serde_json::Map<String, serde_json::Value>,
}

/// Handle `POST /projects/{slug}/data`.
///
/// Writes are authorized by the project's own `api_key`, carried in the
/// body. After the point persists, an aggregation job for the point's day
/// is enqueued so the day's rollup catches up shortly after ingestion.
async fn handler(
    State((pool, _config, queue)): State<AppState>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<IngestRequest>,
) -> Result<StatusCode, ApiError> {
    // ---
    let project = registry::lookup_required(&pool, &slug).await?;

    if body.api_key != project.api_key {
        return Err(ApiError::Authorization("api_key mismatch"));
    }

    let point = points::ingest(&pool, &project, &addr.ip().to_string(), &body.fields).await?;

    queue.enqueue(AggregationJob::for_project(
        &project.slug,
        point.timestamp.date_naive(),
    ));

    Ok(StatusCode::CREATED)
}
