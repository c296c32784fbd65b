//! Administrator-only project registration endpoint.
//!
//! Internal to this file: the request body type and handler. Exported to
//! the gateway: a subrouter with the `POST /projects` route.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use super::{require_admin, AppState};
use crate::{registry, ApiError, Project};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/projects", post(handler))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    // ---
    slug: String,
    title: String,
    api_key: String,
}

/// Handle `POST /projects`.
///
/// Requires the administrator bearer token. On success the created project
/// is echoed back; its `api_key` never appears in the response body.
async fn handler(
    State((pool, config, _queue)): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    // ---
    require_admin(&headers, &config)?;

    let project = registry::register(&pool, &body.slug, &body.title, &body.api_key).await?;

    Ok((StatusCode::CREATED, Json(project)))
}
