//! Read-side assembly of chart-ready field series.
//!
//! A series is the ordered list of daily statistics for one project field
//! over a date range, drawn from the precomputed aggregate rows. Days with
//! no aggregate are simply absent from the output.

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use crate::ApiError;

// ---

/// One series entry: the day plus its `[min, median, max]` triple, in the
/// shape charting clients consume directly.
pub type SeriesEntry = (NaiveDate, [f64; 3]);

/// Default query window: the seven days leading up to and including `today`.
pub fn default_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    // ---
    (today - Duration::days(7), today)
}

/// Parse a `YYYY-MM-DD` query parameter, naming it in the failure message.
pub fn parse_date(value: &str, param: &str) -> Result<NaiveDate, ApiError> {
    // ---
    value
        .parse::<NaiveDate>()
        .map_err(|_| ApiError::validation(format!("{param} is not a valid date (YYYY-MM-DD)")))
}

/// Resolve the requested date window.
///
/// Omitted bounds fall back to the default window around `today`. Equal
/// bounds are a one-day window; an inverted pair is rejected.
pub fn resolve_window(
    start_date: Option<&str>,
    end_date: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    // ---
    let (default_start, default_end) = default_window(today);

    let start = match start_date {
        Some(raw) => parse_date(raw, "start_date")?,
        None => default_start,
    };
    let end = match end_date {
        Some(raw) => parse_date(raw, "end_date")?,
        None => default_end,
    };

    if start > end {
        return Err(ApiError::validation("start_date must not be after end_date"));
    }

    Ok((start, end))
}

#[derive(sqlx::FromRow)]
struct SeriesRow {
    // ---
    date: NaiveDate,
    min: f64,
    max: f64,
    median: f64,
}

/// Fetch the daily statistics for one field over an inclusive date range,
/// oldest day first.
pub async fn field_series(
    pool: &PgPool,
    project_slug: &str,
    field_name: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SeriesEntry>, ApiError> {
    // ---
    let rows = sqlx::query_as::<_, SeriesRow>(
        r#"
        SELECT date, min, max, median
        FROM data_aggregates
        WHERE project_slug = $1
          AND field_name = $2
          AND date >= $3
          AND date <= $4
        ORDER BY date ASC
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
        .map(|row| (row.date, [row.min, row.median, row.max]))
        .collect())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_window_is_seven_days_back() {
        // ---
        let today: NaiveDate = "2025-03-26".parse().unwrap();
        let (start, end) = default_window(today);

        assert_eq!(start, "2025-03-19".parse::<NaiveDate>().unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_parse_date_accepts_iso_dates() {
        // ---
        let date = parse_date("2025-03-26", "start_date").unwrap();
        assert_eq!(date, "2025-03-26".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_parse_date_names_the_parameter() {
        // ---
        let err = parse_date("March 26", "end_date").unwrap_err();
        assert!(err.to_string().contains("end_date"));
    }

    #[test]
    fn test_resolve_window_applies_defaults() {
        // ---
        let today: NaiveDate = "2025-03-26".parse().unwrap();
        let (start, end) = resolve_window(None, None, today).unwrap();

        assert_eq!(start, "2025-03-19".parse::<NaiveDate>().unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_resolve_window_accepts_equal_bounds() {
        // ---
        let today: NaiveDate = "2025-03-26".parse().unwrap();
        let (start, end) =
            resolve_window(Some("2025-03-20"), Some("2025-03-20"), today).unwrap();

        assert_eq!(start, end);
    }

    #[test]
    fn test_resolve_window_rejects_inverted_range() {
        // ---
        let today: NaiveDate = "2025-03-26".parse().unwrap();
        let err = resolve_window(Some("2025-03-21"), Some("2025-03-20"), today).unwrap_err();

        assert!(matches!(err, crate::ApiError::Validation(_)));
    }

    #[test]
    fn test_resolve_window_rejects_malformed_date() {
        // ---
        let today: NaiveDate = "2025-03-26".parse().unwrap();
        assert!(resolve_window(Some("03/20/2025"), None, today).is_err());
    }
}
