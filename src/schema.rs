//! Database schema management for `fieldstat`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `projects` registry, the `data_points` table for raw
/// submissions, and the `data_aggregates` table for the per-day per-field
/// rollups. Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Tenant registry. `field_names` is the growing set of field identifiers
    // observed for the project.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            slug        TEXT PRIMARY KEY,
            title       TEXT   NOT NULL,
            api_key     TEXT   NOT NULL,
            field_names TEXT[] NOT NULL DEFAULT '{}'
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Raw measurement log. `fields` keeps the full submitted map so
    // aggregation can rebuild any day from scratch.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_points (
            id           UUID PRIMARY KEY,
            project_slug TEXT        NOT NULL REFERENCES projects (slug),
            timestamp    TIMESTAMPTZ NOT NULL,
            remote_addr  TEXT        NOT NULL,
            fields       JSONB       NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Rollup table keyed by (project, field, day). `raw_values` retains the
    // full value set so each row is recomputable in isolation.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_aggregates (
            project_slug TEXT NOT NULL,
            field_name   TEXT NOT NULL,
            date         DATE NOT NULL,
            raw_values   DOUBLE PRECISION[] NOT NULL,
            min          DOUBLE PRECISION NOT NULL,
            max          DOUBLE PRECISION NOT NULL,
            average      DOUBLE PRECISION NOT NULL,
            median       DOUBLE PRECISION NOT NULL,
            PRIMARY KEY (project_slug, field_name, date)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_data_points_project_timestamp
            ON data_points (project_slug, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_data_aggregates_series
            ON data_aggregates (project_slug, field_name, date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
