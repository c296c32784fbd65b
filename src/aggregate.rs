//! Daily aggregation engine.
//!
//! Recomputation is a full rebuild: each run derives every per-field value
//! set for the target day from the raw point log, then writes the result
//! over whatever was there before. Running twice for the same (project, day)
//! therefore converges to the same rows, and a day whose points disappeared
//! ends with its aggregate rows deleted rather than left stale.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;

use crate::{points, registry, AggregateKey, ApiError, DataAggregate, DataPoint, Project};

// ---

/// Inclusive UTC timestamp bounds for one calendar day.
///
/// The window runs from 00:00:00 through 23:59:59 of `date`.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::seconds(1);
    (start, end)
}

/// Group point values by field name.
///
/// Every field the project has ever tracked gets an entry, so a field with
/// no points on this day produces an empty set (and its aggregate row is
/// deleted downstream). Fields present on points but not yet in the tracked
/// set are collected too; the tracked set may lag behind ingestion.
fn accumulate(points: &[DataPoint], known_fields: &[String]) -> BTreeMap<String, Vec<f64>> {
    // ---
    let mut buckets: BTreeMap<String, Vec<f64>> = known_fields
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for point in points {
        for (name, value) in &point.fields {
            buckets.entry(name.clone()).or_default().push(*value);
        }
    }

    buckets
}

/// Persist one aggregate row, replacing any previous row for its key.
async fn store(pool: &PgPool, aggregate: &DataAggregate) -> Result<(), ApiError> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO data_aggregates
            (project_slug, field_name, date, raw_values, min, max, average, median)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (project_slug, field_name, date) DO UPDATE
        SET raw_values = EXCLUDED.raw_values,
            min        = EXCLUDED.min,
            max        = EXCLUDED.max,
            average    = EXCLUDED.average,
            median     = EXCLUDED.median
        "#,
    )
    .bind(&aggregate.key.project_slug)
    .bind(&aggregate.key.field_name)
    .bind(aggregate.key.date)
    .bind(&aggregate.values)
    .bind(aggregate.summary.min)
    .bind(aggregate.summary.max)
    .bind(aggregate.summary.average)
    .bind(aggregate.summary.median)
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop the aggregate row for `key` if it exists.
async fn remove(pool: &PgPool, key: &AggregateKey) -> Result<(), ApiError> {
    // ---
    sqlx::query(
        r#"
        DELETE FROM data_aggregates
        WHERE project_slug = $1 AND field_name = $2 AND date = $3
        "#,
    )
    .bind(&key.project_slug)
    .bind(&key.field_name)
    .bind(key.date)
    .execute(pool)
    .await?;

    Ok(())
}

/// Rebuild every per-field aggregate for `project` on `date`.
///
/// Returns how many rows were written and how many were deleted.
pub async fn recompute(
    pool: &PgPool,
    project: &Project,
    date: NaiveDate,
) -> Result<(usize, usize), ApiError> {
    // ---
    let (start, end) = day_bounds(date);
    let day_points = points::points_in_window(pool, &project.slug, start, end).await?;
    let buckets = accumulate(&day_points, &project.field_names);

    let mut written = 0;
    let mut deleted = 0;

    for (field_name, values) in buckets {
        let key = AggregateKey::new(&project.slug, &field_name, date);

        if values.is_empty() {
            remove(pool, &key).await?;
            deleted += 1;
        } else {
            let aggregate = DataAggregate::from_values(key, values);
            store(pool, &aggregate).await?;
            written += 1;
        }
    }

    tracing::info!(
        "aggregated project '{}' for {}: {} row(s) written, {} cleared",
        project.slug,
        date,
        written,
        deleted
    );

    Ok((written, deleted))
}

/// Run aggregation for one project or all of them.
///
/// `slug` of `None` means every registered project; `date` of `None` means
/// yesterday, the most recent fully elapsed day.
pub async fn run(
    pool: &PgPool,
    slug: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<(), ApiError> {
    // ---
    let date = date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));

    let projects = match slug {
        Some(slug) => vec![registry::lookup_required(pool, slug).await?],
        None => registry::list(pool).await?,
    };

    for project in &projects {
        recompute(pool, project, date).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn point(slug: &str, fields: &[(&str, f64)]) -> DataPoint {
        // ---
        DataPoint {
            id: Uuid::new_v4(),
            project_slug: slug.to_string(),
            timestamp: Utc::now(),
            remote_addr: "127.0.0.1".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_day_bounds_are_inclusive() {
        // ---
        let date: NaiveDate = "2025-03-26".parse().unwrap();
        let (start, end) = day_bounds(date);

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 26, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 26, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_accumulate_groups_values_by_field() {
        // ---
        let pts = vec![
            point("demo", &[("signups", 3.0), ("latency_ms", 40.0)]),
            point("demo", &[("signups", 5.0)]),
        ];
        let known = vec!["signups".to_string(), "latency_ms".to_string()];

        let buckets = accumulate(&pts, &known);

        assert_eq!(buckets["signups"], vec![3.0, 5.0]);
        assert_eq!(buckets["latency_ms"], vec![40.0]);
    }

    #[test]
    fn test_accumulate_seeds_known_fields_with_empty_sets() {
        // ---
        // A tracked field with no points this day must still appear, so the
        // engine can clear its stale aggregate row.
        let pts = vec![point("demo", &[("signups", 1.0)])];
        let known = vec!["signups".to_string(), "retired_field".to_string()];

        let buckets = accumulate(&pts, &known);

        assert_eq!(buckets["signups"], vec![1.0]);
        assert!(buckets["retired_field"].is_empty());
    }

    #[test]
    fn test_accumulate_collects_untracked_fields() {
        // ---
        // Ingestion records field names after the point write, so a point can
        // carry a name the tracked set does not have yet.
        let pts = vec![point("demo", &[("brand_new", 7.0)])];
        let known = vec!["signups".to_string()];

        let buckets = accumulate(&pts, &known);

        assert_eq!(buckets["brand_new"], vec![7.0]);
        assert!(buckets["signups"].is_empty());
    }

    #[test]
    fn test_accumulate_empty_inputs() {
        // ---
        let buckets = accumulate(&[], &[]);
        assert!(buckets.is_empty());
    }
}
