//! Read endpoints for project data: the field listing and the per-field
//! aggregate series.
//!
//! Both responses are derived from persisted state only (the project row
//! and the aggregate rows), so they carry a short public cache lifetime.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{aggregate, points, registry, series, ApiError};

// ---

const CACHE_CONTROL_VALUE: &str = "public, max-age=300";

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/projects/{slug}/data", get(list_fields))
        .route("/projects/{slug}/data/{field}", get(field_series))
        .route("/projects/{slug}/data/{field}/raw", get(raw_series))
}

#[derive(Serialize)]
struct FieldsResponse {
    // ---
    fields: Vec<String>,
}

/// Handle `GET /projects/{slug}/data`.
///
/// Returns every field name the project has ever reported.
async fn list_fields(
    State((pool, _config, _queue)): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let project = registry::lookup_required(&pool, &slug).await?;

    Ok((
        [(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)],
        Json(FieldsResponse {
            fields: project.field_names,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct SeriesQuery {
    // ---
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Handle `GET /projects/{slug}/data/{field}`.
///
/// Returns the daily `[date, [min, median, max]]` series for one field over
/// the requested (or default) date window, oldest day first. A field with
/// no aggregates in the window yields an empty array, not an error.
async fn field_series(
    State((pool, _config, _queue)): State<AppState>,
    Path((slug, field)): Path<(String, String)>,
    Query(params): Query<SeriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let project = registry::lookup_required(&pool, &slug).await?;

    let (start, end) = series::resolve_window(
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        Utc::now().date_naive(),
    )?;

    let entries = series::field_series(&pool, &project.slug, &field, start, end).await?;

    tracing::debug!(
        "series for '{}'/'{}': {} day(s) in [{}, {}]",
        project.slug,
        field,
        entries.len(),
        start,
        end
    );

    Ok((
        [(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)],
        Json(entries),
    ))
}

/// Handle `GET /projects/{slug}/data/{field}/raw`.
///
/// Returns the raw `[timestamp, value]` series for one field, read fresh
/// from the point log each call. Unlike the aggregate series this reflects
/// ingestion up to this instant, so the response is not cacheable.
async fn raw_series(
    State((pool, _config, _queue)): State<AppState>,
    Path((slug, field)): Path<(String, String)>,
    Query(params): Query<SeriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let project = registry::lookup_required(&pool, &slug).await?;

    let (start, end) = series::resolve_window(
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        Utc::now().date_naive(),
    )?;

    let (window_start, _) = aggregate::day_bounds(start);
    let (_, window_end) = aggregate::day_bounds(end);

    let entries = points::query_range(&pool, &project.slug, &field, window_start, window_end).await?;

    Ok(Json(entries))
}
