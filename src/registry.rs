//! Project registry: registration, lookup, and field-name tracking.
//!
//! Projects are the unit of tenancy. All other operations resolve a project
//! through this module before touching points or aggregates.

use sqlx::PgPool;

use crate::{ApiError, Project};

// ---

/// Check a registration request before it reaches the database.
///
/// The slug becomes a URL path segment, so it is restricted to ASCII
/// alphanumerics, underscore, and hyphen. Title and api_key only need to be
/// non-empty.
fn validate_registration(slug: &str, title: &str, api_key: &str) -> Result<(), ApiError> {
    // ---
    let slug_ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !slug_ok {
        return Err(ApiError::validation(
            "slug must be non-empty and contain only letters, digits, '_' or '-'",
        ));
    }
    if title.is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if api_key.is_empty() {
        return Err(ApiError::validation("api_key must not be empty"));
    }

    Ok(())
}

/// Register a new project.
///
/// The slug is the primary key; a duplicate registration surfaces as
/// [`ApiError::Conflict`] via the unique-violation SQLSTATE rather than a
/// separate existence probe, so concurrent registrations cannot race.
pub async fn register(
    pool: &PgPool,
    slug: &str,
    title: &str,
    api_key: &str,
) -> Result<Project, ApiError> {
    // ---
    validate_registration(slug, title, api_key)?;

    let result = sqlx::query(
        r#"
        INSERT INTO projects (slug, title, api_key, field_names)
        VALUES ($1, $2, $3, '{}')
        "#,
    )
    .bind(slug)
    .bind(title)
    .bind(api_key)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!("registered project '{}'", slug);
            Ok(Project {
                slug: slug.to_string(),
                title: title.to_string(),
                api_key: api_key.to_string(),
                field_names: Vec::new(),
            })
        }
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => Err(
            ApiError::Conflict(format!("project '{slug}' already exists")),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Fetch a project by slug, or `None` if it was never registered.
pub async fn lookup(pool: &PgPool, slug: &str) -> Result<Option<Project>, ApiError> {
    // ---
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT slug, title, api_key, field_names
        FROM projects
        WHERE slug = $1
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(project)
}

/// Fetch a project by slug, failing with [`ApiError::NotFound`] if absent.
pub async fn lookup_required(pool: &PgPool, slug: &str) -> Result<Project, ApiError> {
    // ---
    lookup(pool, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project '{slug}' not registered")))
}

/// List every registered project, ordered by slug.
pub async fn list(pool: &PgPool) -> Result<Vec<Project>, ApiError> {
    // ---
    let projects = sqlx::query_as::<_, Project>(
        r#"
        SELECT slug, title, api_key, field_names
        FROM projects
        ORDER BY slug
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

/// Merge newly observed field names into the project's known set.
///
/// The set only grows. The write is skipped entirely when every submitted
/// name is already known, which is the common case after a project's first
/// few submissions.
///
/// Last writer wins under concurrency; a lost union is repaired by the next
/// submission that carries the same field name.
pub async fn record_field_usage(
    pool: &PgPool,
    project: &Project,
    observed: impl Iterator<Item = &str>,
) -> Result<(), ApiError> {
    // ---
    let mut merged = project.field_names.clone();
    let mut changed = false;

    for name in observed {
        if !merged.iter().any(|known| known == name) {
            merged.push(name.to_string());
            changed = true;
        }
    }

    if !changed {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE projects
        SET field_names = $2
        WHERE slug = $1
        "#,
    )
    .bind(&project.slug)
    .bind(&merged)
    .execute(pool)
    .await?;

    tracing::debug!(
        "project '{}' now tracks {} field name(s)",
        project.slug,
        merged.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_valid_registration_passes() {
        // ---
        assert!(validate_registration("demo-app_2", "Demo App", "s3cret").is_ok());
    }

    #[test]
    fn test_empty_slug_rejected() {
        // ---
        let err = validate_registration("", "Demo", "key").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_non_url_safe_slug_rejected() {
        // ---
        assert!(validate_registration("demo app", "Demo", "key").is_err());
        assert!(validate_registration("demo/app", "Demo", "key").is_err());
        assert!(validate_registration("démo", "Demo", "key").is_err());
    }

    #[test]
    fn test_empty_title_and_key_rejected() {
        // ---
        assert!(validate_registration("demo", "", "key").is_err());
        assert!(validate_registration("demo", "Demo", "").is_err());
    }
}
