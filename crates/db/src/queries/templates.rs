//! Template database operations.
//!
//! Templates carry two independent approval gates: the content `status` and
//! the separate `admin_approval` gate that binds placeholders and buttons to
//! concrete attributes before any campaign may use the template.

use crate::models::Template;
use smscore::types::TemplateComponent;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;

const TEMPLATE_COLUMNS: &str = r#"id, organization_id, name, language, category, components,
               status, admin_approval, parameters, button_mappings, rejection_reason,
               created_at, updated_at"#;

pub async fn create(
    pool: &PgPool,
    id: &str,
    organization_id: &str,
    name: &str,
    language: &str,
    category: Option<&str>,
    components: &[TemplateComponent],
) -> Result<Template, sqlx::Error> {
    sqlx::query_as::<_, Template>(&format!(
        r#"
        INSERT INTO templates (id, organization_id, name, language, category, components)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TEMPLATE_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(organization_id)
    .bind(name)
    .bind(language)
    .bind(category)
    .bind(Json(components))
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<Template>, sqlx::Error> {
    sqlx::query_as::<_, Template>(&format!(
        r#"
        SELECT {TEMPLATE_COLUMNS}
        FROM templates
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_organization(
    pool: &PgPool,
    organization_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Template>, sqlx::Error> {
    sqlx::query_as::<_, Template>(&format!(
        r#"
        SELECT {TEMPLATE_COLUMNS}
        FROM templates
        WHERE organization_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    ))
    .bind(organization_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// `draft -> pending_approval` for the content gate.
pub async fn submit(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE templates
        SET status = 'pending_approval', updated_at = now()
        WHERE id = $1 AND status IN ('draft', 'rejected')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn approve_content(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE templates
        SET status = 'approved', rejection_reason = NULL, updated_at = now()
        WHERE id = $1 AND status = 'pending_approval'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn reject_content(pool: &PgPool, id: &str, reason: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE templates
        SET status = 'rejected', rejection_reason = $1, updated_at = now()
        WHERE id = $2 AND status = 'pending_approval'
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Admin approval attaches the placeholder -> attribute mapping (and, for
/// quick-reply templates, the button -> auto-reply mapping) and opens the
/// second gate.
pub async fn admin_approve(
    pool: &PgPool,
    id: &str,
    parameters: &HashMap<String, String>,
    button_mappings: &HashMap<String, String>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE templates
        SET admin_approval = 'approved',
            parameters = $1,
            button_mappings = $2,
            updated_at = now()
        WHERE id = $3 AND admin_approval IN ('pending', 'rejected')
        "#,
    )
    .bind(Json(parameters))
    .bind(Json(button_mappings))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn admin_reject(pool: &PgPool, id: &str, reason: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE templates
        SET admin_approval = 'rejected', rejection_reason = $1, updated_at = now()
        WHERE id = $2 AND admin_approval = 'pending'
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
