//! Audience ledger operations.
//!
//! Audience rows carry the per-recipient delivery ladder and the asset
//! generation sub-state. Batch attach is transactional with per-row errors:
//! duplicates are reported, survivors inserted, the organization-wide master
//! audience record merged, and the campaign counter recomputed from a live
//! count before commit.

use crate::models::{AudienceMember, MessageStatus};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;

const MEMBER_COLUMNS: &str = r#"id, campaign_id, organization_id, name, msisdn, attributes,
               message_status, failure_reason, asset_generation_status, asset_retry_count,
               asset_last_error, generated_asset_urls, sent_at, delivered_at, read_at,
               failed_at, asset_generation_started_at, asset_generation_completed_at,
               created_at, updated_at"#;

/// One normalized candidate row for batch attach.
#[derive(Debug, Clone)]
pub struct NewAudienceMember {
    pub id: String,
    /// Pre-minted id for the master-audience upsert of this msisdn.
    pub master_id: String,
    pub name: String,
    pub msisdn: String,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceRowError {
    pub msisdn: String,
    pub error: String,
}

#[derive(Debug)]
pub struct AddBatchOutcome {
    pub added: Vec<AudienceMember>,
    pub errors: Vec<AudienceRowError>,
    pub total_targeted_audience: i32,
}

/// Attach a batch of recipients to a campaign. Partial success: each
/// duplicate `(campaign, msisdn)` is reported per-row and the rest proceed.
pub async fn add_batch(
    pool: &PgPool,
    campaign_id: &str,
    organization_id: &str,
    rows: Vec<NewAudienceMember>,
) -> Result<AddBatchOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut added = Vec::new();
    let mut errors = Vec::new();

    for row in rows {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM audience_members WHERE campaign_id = $1 AND msisdn = $2
            )
            "#,
        )
        .bind(campaign_id)
        .bind(&row.msisdn)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            errors.push(AudienceRowError {
                msisdn: row.msisdn,
                error: "duplicate phone number for this campaign".to_string(),
            });
            continue;
        }

        let member = sqlx::query_as::<_, AudienceMember>(&format!(
            r#"
            INSERT INTO audience_members (id, campaign_id, organization_id, name, msisdn, attributes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEMBER_COLUMNS}
            "#,
        ))
        .bind(&row.id)
        .bind(campaign_id)
        .bind(organization_id)
        .bind(&row.name)
        .bind(&row.msisdn)
        .bind(Json(&row.attributes))
        .fetch_one(&mut *tx)
        .await?;

        // Master audience upsert: new attribute values win, existing keys the
        // batch does not mention are kept.
        sqlx::query(
            r#"
            INSERT INTO master_audience (id, organization_id, name, msisdn, attributes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (organization_id, msisdn)
            DO UPDATE SET name = EXCLUDED.name,
                          attributes = master_audience.attributes || EXCLUDED.attributes,
                          updated_at = now()
            "#,
        )
        .bind(&row.master_id)
        .bind(organization_id)
        .bind(&row.name)
        .bind(&row.msisdn)
        .bind(Json(&row.attributes))
        .execute(&mut *tx)
        .await?;

        added.push(member);
    }

    let (total,): (i32,) = sqlx::query_as(
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
    .bind(campaign_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(AddBatchOutcome {
        added,
        errors,
        total_targeted_audience: total,
    })
}

/// Remove one recipient and recompute the campaign counter in the same
/// transaction. Returns the new counter, or None when the row was absent.
pub async fn remove(
    pool: &PgPool,
    campaign_id: &str,
    member_id: &str,
) -> Result<Option<i32>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM audience_members WHERE id = $1 AND campaign_id = $2")
        .bind(member_id)
        .bind(campaign_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let (total,): (i32,) = sqlx::query_as(
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
    .bind(campaign_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(total))
}

pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<AudienceMember>, sqlx::Error> {
    sqlx::query_as::<_, AudienceMember>(&format!(
        r#"
        SELECT {MEMBER_COLUMNS}
        FROM audience_members
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_campaign(
    pool: &PgPool,
    campaign_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<AudienceMember>, sqlx::Error> {
    sqlx::query_as::<_, AudienceMember>(&format!(
        r#"
        SELECT {MEMBER_COLUMNS}
        FROM audience_members
        WHERE campaign_id = $1
        ORDER BY created_at
        LIMIT $2 OFFSET $3
        "#,
    ))
    .bind(campaign_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Rows the batcher may dispatch: on a pre-send rung, and past the asset
/// gate when the template needs generated media.
pub async fn list_eligible_for_send(
    pool: &PgPool,
    campaign_id: &str,
    asset_required: bool,
) -> Result<Vec<AudienceMember>, sqlx::Error> {
    sqlx::query_as::<_, AudienceMember>(&format!(
        r#"
        SELECT {MEMBER_COLUMNS}
        FROM audience_members
        WHERE campaign_id = $1
          AND message_status IN ('pending', 'asset_generated', 'ready_to_send')
          AND (NOT $2 OR asset_generation_status = 'generated')
        ORDER BY created_at
        "#,
    ))
    .bind(campaign_id)
    .bind(asset_required)
    .fetch_all(pool)
    .await
}

/// Conditionally advance a recipient's ladder, stamping the timestamp column
/// matching the new status. Returns false when the row already left the
/// expected rung.
pub async fn update_message_status(
    pool: &PgPool,
    id: &str,
    from: MessageStatus,
    to: MessageStatus,
    failure_reason: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET message_status = $1,
            failure_reason = CASE WHEN $1 = 'failed'::message_status THEN $2 ELSE failure_reason END,
            sent_at = CASE WHEN $1 = 'sent'::message_status THEN now() ELSE sent_at END,
            delivered_at = CASE WHEN $1 = 'delivered'::message_status THEN now() ELSE delivered_at END,
            read_at = CASE WHEN $1 = 'read'::message_status THEN now() ELSE read_at END,
            failed_at = CASE WHEN $1 = 'failed'::message_status THEN now() ELSE failed_at END,
            updated_at = now()
        WHERE id = $3 AND message_status = $4
        "#,
    )
    .bind(to)
    .bind(failure_reason)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put a failed recipient back on `ready_to_send` for a requeued delivery,
/// clearing the failure annotation. Conditional on the failed rung so a
/// duplicate retry pass no-ops.
pub async fn reopen_failed_delivery(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET message_status = 'ready_to_send',
            failure_reason = NULL,
            updated_at = now()
        WHERE id = $1 AND message_status = 'failed'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Kick off asset generation for every untouched recipient of a campaign.
/// Returns how many rows entered the processing sub-state.
pub async fn begin_asset_generation(pool: &PgPool, campaign_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET message_status = 'asset_generating',
            asset_generation_status = 'processing',
            asset_generation_started_at = now(),
            updated_at = now()
        WHERE campaign_id = $1
          AND message_status = 'pending'
          AND asset_generation_status = 'pending'
        "#,
    )
    .bind(campaign_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Record a successful asset generation callback: merge the new URLs and
/// advance both ladders.
pub async fn complete_asset_generation(
    pool: &PgPool,
    id: &str,
    urls: &HashMap<String, String>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET asset_generation_status = 'generated',
            asset_generation_completed_at = now(),
            generated_asset_urls = generated_asset_urls || $1,
            message_status = CASE WHEN message_status = 'asset_generating'
                                  THEN 'asset_generated'::message_status
                                  ELSE message_status END,
            updated_at = now()
        WHERE id = $2 AND asset_generation_status = 'processing'
        "#,
    )
    .bind(Json(urls))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Record a failed asset generation callback.
pub async fn fail_asset_generation(
    pool: &PgPool,
    id: &str,
    error: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET asset_generation_status = 'failed',
            asset_generation_completed_at = now(),
            asset_last_error = $1,
            asset_retry_count = asset_retry_count + 1,
            updated_at = now()
        WHERE id = $2 AND asset_generation_status = 'processing'
        "#,
    )
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Re-open failed per-recipient asset generation for another attempt.
pub async fn reopen_failed_assets(pool: &PgPool, campaign_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE audience_members
        SET asset_generation_status = 'processing',
            asset_generation_started_at = now(),
            asset_generation_completed_at = NULL,
            updated_at = now()
        WHERE campaign_id = $1 AND asset_generation_status = 'failed'
        "#,
    )
    .bind(campaign_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// How many recipients still have asset generation in flight.
pub async fn count_unfinished_assets(
    pool: &PgPool,
    campaign_id: &str,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT count(*)
        FROM audience_members
        WHERE campaign_id = $1 AND asset_generation_status IN ('pending', 'processing')
        "#,
    )
    .bind(campaign_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn count_by_campaign(pool: &PgPool, campaign_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM audience_members WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Returns true when an asset sub-state exists in `failed` for the campaign.
pub async fn has_failed_assets(pool: &PgPool, campaign_id: &str) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM audience_members
            WHERE campaign_id = $1 AND asset_generation_status = 'failed'
        )
        "#,
    )
    .bind(campaign_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}
