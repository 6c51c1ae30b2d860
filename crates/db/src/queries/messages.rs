//! Delivery record operations.
//!
//! One `messages` row exists per attempted send. The retry subsystem claims
//! eligible failures with a conditional update on `(status, retry_count)` so
//! a crashed run leaves rows in `failed` and the next run simply re-evaluates
//! eligibility.

use crate::models::{Message, MessageStatus};
use sqlx::PgPool;

const MESSAGE_COLUMNS: &str = r#"id, organization_id, campaign_id, audience_member_id, direction,
               template_id, content, message_status, retry_count, failure_reason,
               provider_message_id, failed_at, created_at, updated_at"#;

/// Create an outbound delivery record in `pending`.
#[allow(clippy::too_many_arguments)]
pub async fn create_outbound(
    pool: &PgPool,
    id: &str,
    organization_id: &str,
    campaign_id: &str,
    audience_member_id: &str,
    template_id: Option<&str>,
    content: Option<&str>,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (id, organization_id, campaign_id, audience_member_id,
                              direction, template_id, content)
        VALUES ($1, $2, $3, $4, 'outbound', $5, $6)
        RETURNING {MESSAGE_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(organization_id)
    .bind(campaign_id)
    .bind(audience_member_id)
    .bind(template_id)
    .bind(content)
    .fetch_one(pool)
    .await
}

/// Record an inbound reply against a campaign recipient.
pub async fn create_inbound(
    pool: &PgPool,
    id: &str,
    organization_id: &str,
    campaign_id: &str,
    audience_member_id: &str,
    content: &str,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (id, organization_id, campaign_id, audience_member_id,
                              direction, content, message_status)
        VALUES ($1, $2, $3, $4, 'inbound', $5, 'delivered')
        RETURNING {MESSAGE_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(organization_id)
    .bind(campaign_id)
    .bind(audience_member_id)
    .bind(content)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Advance a delivery record after a provider status callback.
pub async fn update_status(
    pool: &PgPool,
    id: &str,
    status: MessageStatus,
    provider_message_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET message_status = $1,
            provider_message_id = COALESCE($2, provider_message_id),
            updated_at = now()
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(provider_message_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a delivery failed with a reason, stamping `failed_at` for the retry
/// eligibility clock.
pub async fn mark_failed(pool: &PgPool, id: &str, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET message_status = 'failed',
            failure_reason = $1,
            failed_at = now(),
            updated_at = now()
        WHERE id = $2
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Failed outbound deliveries still inside the retry budget. Backoff
/// eligibility is evaluated in the caller against the policy function.
pub async fn list_failed_within_budget(
    pool: &PgPool,
    max_retry_count: i32,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE direction = 'outbound'
          AND message_status = 'failed'
          AND retry_count < $1
          AND failed_at IS NOT NULL
        ORDER BY failed_at
        LIMIT $2
        "#,
    ))
    .bind(max_retry_count)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Claim a failed delivery for one more attempt: bump `retry_count`, reset to
/// `pending` and refresh the resolved content. The `(status, retry_count)`
/// condition makes the claim safe under concurrent retry passes.
pub async fn requeue_for_retry(
    pool: &PgPool,
    id: &str,
    expected_retry_count: i32,
    content: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET message_status = 'pending',
            retry_count = retry_count + 1,
            content = COALESCE($1, content),
            updated_at = now()
        WHERE id = $2 AND message_status = 'failed' AND retry_count = $3
        "#,
    )
    .bind(content)
    .bind(id)
    .bind(expected_retry_count)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Terminal failure: the retry budget is spent or the payload can no longer
/// be regenerated. Pinning `retry_count` to the budget takes the row out of
/// every future eligibility query.
pub async fn mark_permanently_failed(
    pool: &PgPool,
    id: &str,
    reason: &str,
    max_retry_count: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET message_status = 'failed',
            failure_reason = $1,
            retry_count = GREATEST(retry_count, $2),
            failed_at = COALESCE(failed_at, now()),
            updated_at = now()
        WHERE id = $3
        "#,
    )
    .bind(reason)
    .bind(max_retry_count)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_by_campaign(
    pool: &PgPool,
    campaign_id: &str,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE campaign_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    ))
    .bind(campaign_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
