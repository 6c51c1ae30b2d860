//! Campaign database operations.
//!
//! Campaign rows only change state through conditional updates keyed on the
//! expected current status, so concurrent requests and duplicate queue
//! deliveries collapse to a single winner. Callers check the transition
//! table first and treat a zero-row update as a lost race.

use crate::models::{AssetStatus, Campaign, CampaignStatus, CampaignType};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Create a new campaign in `draft`.
pub async fn create(
    pool: &PgPool,
    id: &str,
    organization_id: &str,
    template_id: &str,
    name: &str,
    campaign_type: CampaignType,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<Campaign, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns (id, organization_id, template_id, name, campaign_type, scheduled_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, organization_id, template_id, name, campaign_type, scheduled_at,
                  status, rejection_reason, approved_by, approved_at, rejected_by, rejected_at,
                  asset_generation_status, asset_retry_count, asset_last_error,
                  total_targeted_audience, total_sent, total_delivered, total_read,
                  total_replied, total_failed, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(template_id)
    .bind(name)
    .bind(campaign_type)
    .bind(scheduled_at)
    .fetch_one(pool)
    .await
}

/// Fetch a campaign by its unique ID.
pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        SELECT id, organization_id, template_id, name, campaign_type, scheduled_at,
               status, rejection_reason, approved_by, approved_at, rejected_by, rejected_at,
               asset_generation_status, asset_retry_count, asset_last_error,
               total_targeted_audience, total_sent, total_delivered, total_read,
               total_replied, total_failed, created_at, updated_at
        FROM campaigns
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_details(
    pool: &PgPool,
    id: &str,
    name: &str,
    template_id: &str,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET name = $1, template_id = $2, scheduled_at = $3, updated_at = now()
        WHERE id = $4
        "#,
    )
    .bind(name)
    .bind(template_id)
    .bind(scheduled_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Conditionally move a campaign from `from` to `to`.
///
/// Returns false when the row was no longer in `from`, i.e. another writer
/// won the transition.
pub async fn transition(
    pool: &PgPool,
    id: &str,
    from: CampaignStatus,
    to: CampaignStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = $1, updated_at = now()
        WHERE id = $2 AND status = $3
        "#,
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Approve a pending campaign, stamping the actor and clearing any earlier
/// rejection.
pub async fn approve(pool: &PgPool, id: &str, actor: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = 'approved',
            approved_by = $1,
            approved_at = now(),
            rejected_by = NULL,
            rejected_at = NULL,
            rejection_reason = NULL,
            updated_at = now()
        WHERE id = $2 AND status = 'pending_approval'
        "#,
    )
    .bind(actor)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Reject a pending campaign with a reason, clearing any earlier approval.
pub async fn reject(
    pool: &PgPool,
    id: &str,
    actor: &str,
    reason: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET status = 'rejected',
            rejected_by = $1,
            rejected_at = now(),
            rejection_reason = $2,
            approved_by = NULL,
            approved_at = NULL,
            updated_at = now()
        WHERE id = $3 AND status = 'pending_approval'
        "#,
    )
    .bind(actor)
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Roll a campaign that blew up mid-dispatch back to `asset_generated` so a
/// later scheduler pass retries the whole campaign.
pub async fn rollback_to_asset_generated(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET status = 'asset_generated', updated_at = now()
        WHERE id = $1 AND status IN ('ready_to_launch', 'running')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Campaigns the poller should look at this tick: approved campaigns that
/// have not begun asset generation, campaigns mid asset generation, and
/// asset-complete campaigns whose schedule (if any) has elapsed.
pub async fn find_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        SELECT id, organization_id, template_id, name, campaign_type, scheduled_at,
               status, rejection_reason, approved_by, approved_at, rejected_by, rejected_at,
               asset_generation_status, asset_retry_count, asset_last_error,
               total_targeted_audience, total_sent, total_delivered, total_read,
               total_replied, total_failed, created_at, updated_at
        FROM campaigns
        WHERE status IN ('approved', 'asset_generation')
           OR (status IN ('asset_generated', 'ready_to_launch')
               AND (scheduled_at IS NULL OR scheduled_at <= $1))
        ORDER BY created_at
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Recompute `total_targeted_audience` from a live count of audience rows.
pub async fn recount_audience(pool: &PgPool, id: &str) -> Result<i32, sqlx::Error> {
    let (count,): (i32,) = sqlx::query_as(
        r#"
        UPDATE campaigns
        SET total_targeted_audience = (
                SELECT count(*) FROM audience_members WHERE campaign_id = campaigns.id
            ),
            updated_at = now()
        WHERE id = $1
        RETURNING total_targeted_audience
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Atomically bump the campaign aggregate counters.
pub async fn increment_counts(
    pool: &PgPool,
    id: &str,
    sent_delta: i32,
    delivered_delta: i32,
    read_delta: i32,
    replied_delta: i32,
    failed_delta: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET total_sent = total_sent + $1,
            total_delivered = total_delivered + $2,
            total_read = total_read + $3,
            total_replied = total_replied + $4,
            total_failed = total_failed + $5,
            updated_at = now()
        WHERE id = $6
        "#,
    )
    .bind(sent_delta)
    .bind(delivered_delta)
    .bind(read_delta)
    .bind(replied_delta)
    .bind(failed_delta)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the campaign-level asset generation sub-state.
pub async fn set_asset_status(
    pool: &PgPool,
    id: &str,
    status: AssetStatus,
    last_error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET asset_generation_status = $1,
            asset_last_error = $2,
            updated_at = now()
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(last_error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Campaigns whose asset generation phase failed and still has retry budget.
pub async fn list_asset_failed(
    pool: &PgPool,
    max_retry_count: i32,
) -> Result<Vec<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        SELECT id, organization_id, template_id, name, campaign_type, scheduled_at,
               status, rejection_reason, approved_by, approved_at, rejected_by, rejected_at,
               asset_generation_status, asset_retry_count, asset_last_error,
               total_targeted_audience, total_sent, total_delivered, total_read,
               total_replied, total_failed, created_at, updated_at
        FROM campaigns
        WHERE status = 'asset_generation'
          AND asset_generation_status = 'failed'
          AND asset_retry_count < $1
        ORDER BY updated_at
        "#,
    )
    .bind(max_retry_count)
    .fetch_all(pool)
    .await
}

/// Re-open campaign asset generation for another attempt, bumping the
/// sub-state retry counter.
pub async fn reopen_asset_generation(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET asset_generation_status = 'processing',
            asset_retry_count = asset_retry_count + 1,
            asset_last_error = NULL,
            updated_at = now()
        WHERE id = $1 AND asset_generation_status = 'failed'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
