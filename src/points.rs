//! Raw data point ingestion and retrieval.
//!
//! A point is stored exactly as validated, with a server-assigned timestamp
//! and the submitter's address. The point log is append-only; aggregation
//! reads it but never mutates it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::parse_field_values;
use crate::{registry, ApiError, DataPoint, Project};

// ---

/// Validate and store one submission for `project`.
///
/// The timestamp is taken from the server clock at this call, never from the
/// client. After the point is stored, any field names not yet tracked by the
/// project are merged into its known set.
pub async fn ingest(
    pool: &PgPool,
    project: &Project,
    remote_addr: &str,
    raw_fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<DataPoint, ApiError> {
    // ---
    let fields = parse_field_values(raw_fields).map_err(ApiError::validation)?;

    let point = DataPoint {
        id: Uuid::new_v4(),
        project_slug: project.slug.clone(),
        timestamp: Utc::now(),
        remote_addr: remote_addr.to_string(),
        fields,
    };

    sqlx::query(
        r#"
        INSERT INTO data_points (id, project_slug, timestamp, remote_addr, fields)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(point.id)
    .bind(&point.project_slug)
    .bind(point.timestamp)
    .bind(&point.remote_addr)
    .bind(Json(&point.fields))
    .execute(pool)
    .await?;

    registry::record_field_usage(pool, project, point.fields.keys().map(String::as_str)).await?;

    tracing::debug!(
        "stored point {} for project '{}' ({} field(s))",
        point.id,
        point.project_slug,
        point.fields.len()
    );

    Ok(point)
}

/// Row shape for point queries; `fields` round-trips through JSONB.
#[derive(sqlx::FromRow)]
struct PointRow {
    // ---
    id: Uuid,
    project_slug: String,
    timestamp: DateTime<Utc>,
    remote_addr: String,
    fields: Json<BTreeMap<String, f64>>,
}

impl From<PointRow> for DataPoint {
    fn from(row: PointRow) -> Self {
        DataPoint {
            id: row.id,
            project_slug: row.project_slug,
            timestamp: row.timestamp,
            remote_addr: row.remote_addr,
            fields: row.fields.0,
        }
    }
}

/// Fetch the raw `(timestamp, value)` series of one field for
/// `project_slug` within the inclusive timestamp window, oldest first.
///
/// Reads the point log directly rather than the aggregate rows, so the
/// result reflects ingestion up to this instant.
pub async fn query_range(
    pool: &PgPool,
    project_slug: &str,
    field_name: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, f64)>, ApiError> {
    // ---
    let rows = sqlx::query_as::<_, PointRow>(
        r#"
        SELECT id, project_slug, timestamp, remote_addr, fields
        FROM data_points
        WHERE project_slug = $1
          AND jsonb_exists(fields, $2)
          AND timestamp >= $3
          AND timestamp <= $4
        ORDER BY timestamp ASC
        "#,
    )
    .bind(project_slug)
    .bind(field_name)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.fields.0.get(field_name).map(|v| (row.timestamp, *v)))
        .collect())
}

/// Fetch every point for `project_slug` within the inclusive timestamp
/// window, regardless of which fields it carries.
pub async fn points_in_window(
    pool: &PgPool,
    project_slug: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DataPoint>, ApiError> {
    // ---
    let rows = sqlx::query_as::<_, PointRow>(
        r#"
        SELECT id, project_slug, timestamp, remote_addr, fields
        FROM data_points
        WHERE project_slug = $1
          AND timestamp >= $2
          AND timestamp <= $3
        ORDER BY timestamp ASC
        "#,
    )
    .bind(project_slug)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(DataPoint::from).collect())
}
