use axum::http::{header, HeaderMap};
use axum::Router;
use sqlx::PgPool;

use crate::{ApiError, Config, JobQueue};

mod aggregates;
mod get_data;
mod health;
mod ingest;
mod projects;

// ---

/// Shared state attached to every route: the connection pool, the loaded
/// configuration, and the aggregation queue handle.
pub type AppState = (PgPool, Config, JobQueue);

pub fn router(pool: PgPool, config: Config, queue: JobQueue) -> Router {
    // ---
    Router::new()
        .merge(projects::router())
        .merge(ingest::router())
        .merge(get_data::router())
        .merge(aggregates::router())
        .merge(health::router())
        .with_state((pool, config, queue))
}

/// Check the administrator bearer token on privileged routes.
///
/// The token must arrive as `Authorization: Bearer <ADMIN_API_KEY>`; any
/// other shape or value is an authorization failure, never a validation one.
pub(crate) fn require_admin(headers: &HeaderMap, config: &Config) -> Result<(), ApiError> {
    // ---
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == config.admin_api_key => Ok(()),
        _ => Err(ApiError::Authorization("administrator token required")),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> Config {
        // ---
        Config {
            db_url: "postgres://localhost/test".to_string(),
            db_pool_max: 5,
            admin_api_key: "adm1n".to_string(),
        }
    }

    #[test]
    fn test_admin_token_accepted() {
        // ---
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer adm1n"),
        );
        assert!(require_admin(&headers, &config()).is_ok());
    }

    #[test]
    fn test_wrong_token_rejected() {
        // ---
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer nope"),
        );
        assert!(require_admin(&headers, &config()).is_err());
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        // ---
        assert!(require_admin(&HeaderMap::new(), &config()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("adm1n"));
        assert!(require_admin(&headers, &config()).is_err());
    }
}
