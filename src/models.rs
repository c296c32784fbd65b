//! Data models for the metric rollup pipeline.
//!
//! `Project` owns identity and the evolving set of field names; `DataPoint`
//! is one immutable multi-field measurement; `DataAggregate` is the per-day
//! per-field statistical summary keyed by [`AggregateKey`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// A tenant namespace identified by a unique slug.
///
/// `field_names` is the set of field identifiers ever observed for this
/// project. It only grows, and its order carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    // ---
    pub slug: String,
    pub title: String,
    /// Shared secret authorizing writes; compared by exact match and never
    /// serialized into API responses.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub field_names: Vec<String>,
}

/// One timestamped, multi-field measurement submission.
///
/// The timestamp is assigned by the server clock at ingestion, never taken
/// from the client, so day bucketing is immune to client clock skew.
#[derive(Debug, Clone, Serialize)]
pub struct DataPoint {
    // ---
    pub id: Uuid,
    pub project_slug: String,
    pub timestamp: DateTime<Utc>,
    pub remote_addr: String,
    pub fields: BTreeMap<String, f64>,
}

/// Composite key identifying one per-day, per-field aggregate.
///
/// Compared structurally, never as a formatted string, so slugs or field
/// names containing a separator character cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    // ---
    pub project_slug: String,
    pub field_name: String,
    pub date: NaiveDate,
}

impl AggregateKey {
    pub fn new(project_slug: &str, field_name: &str, date: NaiveDate) -> Self {
        AggregateKey {
            project_slug: project_slug.to_string(),
            field_name: field_name.to_string(),
            date,
        }
    }
}

/// Derived statistics for one aggregate's value set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    // ---
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub median: f64,
}

impl Summary {
    /// Compute min/max/mean/median over a value set.
    ///
    /// An empty set yields all zeros (an explicit policy, not an error; the
    /// aggregation engine deletes empty aggregates rather than storing them).
    ///
    /// The median is the element at `len / 2` of the ascending sort. For an
    /// even count this selects the upper-middle element, not the average of
    /// the two middle elements.
    pub fn from_values(values: &[f64]) -> Summary {
        // ---
        if values.is_empty() {
            return Summary {
                min: 0.0,
                max: 0.0,
                average: 0.0,
                median: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        // Values are validated finite at ingestion, so total_cmp is a plain
        // numeric sort here.
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let average = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let median = sorted[sorted.len() / 2];

        Summary {
            min,
            max,
            average,
            median,
        }
    }
}

/// The per-day, per-field aggregate row: the full raw value set for that day
/// plus the statistics derived from it.
///
/// Retaining `values` (not just the statistics) keeps the row self-consistent
/// and recomputable without re-reading raw points.
#[derive(Debug, Clone)]
pub struct DataAggregate {
    // ---
    pub key: AggregateKey,
    pub values: Vec<f64>,
    pub summary: Summary,
}

impl DataAggregate {
    /// Build an aggregate for `key`, deriving the statistics from `values`.
    pub fn from_values(key: AggregateKey, values: Vec<f64>) -> DataAggregate {
        // ---
        let summary = Summary::from_values(&values);
        DataAggregate {
            key,
            values,
            summary,
        }
    }
}

// ---

/// Parse a submitted field map into validated `field name -> finite f64`
/// entries.
///
/// Values may arrive as JSON numbers or as numeric strings (clients posting
/// form-style payloads send strings). Any entry that is not a finite number
/// fails the entire map; partial ingestion is never performed. An empty map
/// is also rejected.
pub fn parse_field_values(
    raw: &serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, f64>, String> {
    // ---
    if raw.is_empty() {
        return Err("at least one field value is required".to_string());
    }

    let mut parsed = BTreeMap::new();

    for (name, value) in raw {
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match number {
            Some(n) if n.is_finite() => {
                parsed.insert(name.clone(), n);
            }
            _ => {
                return Err(format!("field '{name}' is not a finite number"));
            }
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        // ---
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_summary_basic_statistics() {
        // ---
        let summary = Summary::from_values(&[1.0, 5.0, 9.0]);

        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 9.0);
        assert_eq!(summary.average, 5.0);
        assert_eq!(summary.median, 5.0);
    }

    #[test]
    fn test_median_even_count_takes_upper_middle() {
        // ---
        // sorted[4 / 2] == sorted[2] == 3, never the conventional 2.5
        let summary = Summary::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.median, 3.0);
    }

    #[test]
    fn test_summary_unsorted_input() {
        // ---
        let summary = Summary::from_values(&[9.0, 1.0, 5.0]);

        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 9.0);
        assert_eq!(summary.median, 5.0);
    }

    #[test]
    fn test_summary_single_value() {
        // ---
        let summary = Summary::from_values(&[4.2]);

        assert_eq!(summary.min, 4.2);
        assert_eq!(summary.max, 4.2);
        assert_eq!(summary.average, 4.2);
        assert_eq!(summary.median, 4.2);
    }

    #[test]
    fn test_summary_empty_set_is_all_zeros() {
        // ---
        let summary = Summary::from_values(&[]);

        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 0.0);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.median, 0.0);
    }

    #[test]
    fn test_aggregate_from_values_derives_summary() {
        // ---
        let key = AggregateKey::new("demo", "signups", "2025-03-26".parse().unwrap());
        let agg = DataAggregate::from_values(key.clone(), vec![2.0, 8.0]);

        assert_eq!(agg.key, key);
        assert_eq!(agg.values, vec![2.0, 8.0]);
        assert_eq!(agg.summary.min, 2.0);
        assert_eq!(agg.summary.max, 8.0);
        assert_eq!(agg.summary.average, 5.0);
        // Even count: upper-middle element.
        assert_eq!(agg.summary.median, 8.0);
    }

    #[test]
    fn test_aggregate_keys_compare_structurally() {
        // ---
        let date: NaiveDate = "2025-03-26".parse().unwrap();
        // A concatenated surrogate key would make these two collide.
        let a = AggregateKey::new("demo:x", "y", date);
        let b = AggregateKey::new("demo", "x:y", date);
        assert_ne!(a, b);
        assert_eq!(a, AggregateKey::new("demo:x", "y", date));
    }

    #[test]
    fn test_parse_accepts_numbers_and_numeric_strings() {
        // ---
        let raw = fields(json!({"signups": 12, "latency_ms": "47.5"}));
        let parsed = parse_field_values(&raw).unwrap();

        assert_eq!(parsed["signups"], 12.0);
        assert_eq!(parsed["latency_ms"], 47.5);
    }

    #[test]
    fn test_parse_rejects_non_numeric_string() {
        // ---
        let raw = fields(json!({"signups": 12, "latency_ms": "fast"}));
        assert!(parse_field_values(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_non_finite_values() {
        // ---
        // "NaN" and "inf" parse as f64 but are not storable measurements.
        assert!(parse_field_values(&fields(json!({"a": "NaN"}))).is_err());
        assert!(parse_field_values(&fields(json!({"a": "inf"}))).is_err());
    }

    #[test]
    fn test_parse_rejects_non_scalar_json() {
        // ---
        assert!(parse_field_values(&fields(json!({"a": true}))).is_err());
        assert!(parse_field_values(&fields(json!({"a": null}))).is_err());
        assert!(parse_field_values(&fields(json!({"a": [1, 2]}))).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_map() {
        // ---
        let raw = fields(json!({}));
        assert!(parse_field_values(&raw).is_err());
    }

    #[test]
    fn test_parse_is_all_or_nothing() {
        // ---
        // One bad entry must fail the whole map, not drop the entry.
        let raw = fields(json!({"good": 1, "bad": "oops"}));
        assert!(parse_field_values(&raw).is_err());
    }
}
