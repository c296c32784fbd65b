//! Manual aggregation trigger.
//!
//! Internal to this file: the query parameter type and handler. Exported to
//! the gateway: a subrouter with the `POST /aggregates/update` route.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;

use super::{require_admin, AppState};
use crate::{aggregate, series, ApiError};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/aggregates/update", post(handler))
}

#[derive(Debug, Deserialize)]
struct UpdateQuery {
    // ---
    project: Option<String>,
    date: Option<String>,
}

/// Handle `POST /aggregates/update`.
///
/// Requires the administrator bearer token. Omitting `project` sweeps every
/// registered project; omitting `date` targets yesterday. The run executes
/// synchronously so operators and cron callers observe completion, and
/// rebuilds are full replacements, so repeating a call is harmless.
async fn handler(
    State((pool, config, _queue)): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UpdateQuery>,
) -> Result<StatusCode, ApiError> {
    // ---
    require_admin(&headers, &config)?;

    let date = params
        .date
        .as_deref()
        .map(|raw| series::parse_date(raw, "date"))
        .transpose()?;

    aggregate::run(&pool, params.project.as_deref(), date).await?;

    Ok(StatusCode::NO_CONTENT)
}
