//! Asset generation kickoff and recovery.
//!
//! The generation itself happens in an external collaborator; this module
//! only flips the campaign and per-recipient sub-states and publishes one
//! asset job per recipient. Results come back through the API callbacks.

use anyhow::Context;
use db::models::{AssetStatus, Campaign, CampaignStatus};
use tracing::{info, warn};

use crate::queue::AssetJob;
use crate::DispatchState;

/// `approved -> asset_generation`: mark every untouched recipient as
/// processing and enqueue its asset job. Campaigns whose template needs no
/// generated media skip straight through to `asset_generated`.
pub async fn kick_off(state: &DispatchState, campaign: &Campaign) -> anyhow::Result<()> {
    if !db::queries::campaigns::transition(
        &state.db,
        &campaign.id,
        CampaignStatus::Approved,
        CampaignStatus::AssetGeneration,
    )
    .await?
    {
        return Ok(());
    }

    let template = db::queries::templates::get_by_id(&state.db, &campaign.template_id)
        .await?
        .context("campaign template not found")?;
    let view = template.view();

    if !view.requires_generated_asset() {
        db::queries::campaigns::set_asset_status(
            &state.db,
            &campaign.id,
            AssetStatus::Generated,
            None,
        )
        .await?;
        db::queries::campaigns::transition(
            &state.db,
            &campaign.id,
            CampaignStatus::AssetGeneration,
            CampaignStatus::AssetGenerated,
        )
        .await?;
        return Ok(());
    }

    db::queries::campaigns::set_asset_status(&state.db, &campaign.id, AssetStatus::Processing, None)
        .await?;
    let started = db::queries::audience::begin_asset_generation(&state.db, &campaign.id).await?;
    info!(campaign_id = %campaign.id, recipients = started, "asset generation started");

    publish_jobs(state, campaign, view.header_media_kind()).await
}

/// A tick-time check for campaigns mid asset generation: once every
/// recipient's sub-state is terminal, either advance the campaign or record
/// the failed phase for the retry subsystem.
pub async fn check_completion(state: &DispatchState, campaign: &Campaign) -> anyhow::Result<()> {
    // Audience attached after kickoff sits with both sub-states pending and
    // no published job; sweep those rows in first or the completion count
    // below would wait on them forever. Republishing in-flight recipients is
    // harmless: result callbacks are conditional on the processing sub-state.
    let swept = db::queries::audience::begin_asset_generation(&state.db, &campaign.id).await?;
    if swept > 0 {
        info!(campaign_id = %campaign.id, recipients = swept, "late audience joined asset generation");
        let template = db::queries::templates::get_by_id(&state.db, &campaign.template_id)
            .await?
            .context("campaign template not found")?;
        publish_jobs(state, campaign, template.view().header_media_kind()).await?;
        return Ok(());
    }

    let unfinished =
        db::queries::audience::count_unfinished_assets(&state.db, &campaign.id).await?;
    if unfinished > 0 {
        return Ok(());
    }

    if db::queries::audience::has_failed_assets(&state.db, &campaign.id).await? {
        db::queries::campaigns::set_asset_status(
            &state.db,
            &campaign.id,
            AssetStatus::Failed,
            Some("asset generation failed for one or more recipients"),
        )
        .await?;
        warn!(campaign_id = %campaign.id, "asset generation finished with failures");
        return Ok(());
    }

    db::queries::campaigns::set_asset_status(&state.db, &campaign.id, AssetStatus::Generated, None)
        .await?;
    db::queries::campaigns::transition(
        &state.db,
        &campaign.id,
        CampaignStatus::AssetGeneration,
        CampaignStatus::AssetGenerated,
    )
    .await?;
    info!(campaign_id = %campaign.id, "asset generation complete");
    Ok(())
}

/// Retry-subsystem path: re-open a failed generation phase and republish
/// jobs for the recipients that failed.
pub async fn reopen(state: &DispatchState, campaign: &Campaign) -> anyhow::Result<()> {
    if !db::queries::campaigns::reopen_asset_generation(&state.db, &campaign.id).await? {
        return Ok(());
    }

    let reopened = db::queries::audience::reopen_failed_assets(&state.db, &campaign.id).await?;
    info!(campaign_id = %campaign.id, recipients = reopened, "asset generation re-opened");

    let template = db::queries::templates::get_by_id(&state.db, &campaign.template_id)
        .await?
        .context("campaign template not found")?;

    publish_jobs(state, campaign, template.view().header_media_kind()).await
}

async fn publish_jobs(
    state: &DispatchState,
    campaign: &Campaign,
    media_kind: Option<&str>,
) -> anyhow::Result<()> {
    let media_kinds: Vec<String> = media_kind.map(str::to_string).into_iter().collect();

    // One job per recipient currently in the processing sub-state.
    let mut offset = 0;
    loop {
        let members =
            db::queries::audience::list_by_campaign(&state.db, &campaign.id, 100, offset).await?;
        if members.is_empty() {
            break;
        }
        offset += members.len() as i64;

        for member in members {
            if member.asset_generation_status != AssetStatus::Processing {
                continue;
            }
            let job = AssetJob {
                campaign_id: campaign.id.clone(),
                audience_member_id: member.id.clone(),
                organization_id: campaign.organization_id.clone(),
                template_id: campaign.template_id.clone(),
                media_kinds: media_kinds.clone(),
            };
            if let Err(err) = state.queue.publish(&state.settings.asset_queue, &job).await {
                // The collaborator never hears about this recipient; record
                // the failure so the retry pass can re-open it.
                warn!(
                    campaign_id = %campaign.id,
                    audience_member_id = %member.id,
                    error = %err,
                    "asset job publish failed"
                );
                db::queries::audience::fail_asset_generation(
                    &state.db,
                    &member.id,
                    &format!("asset job publish failed: {err}"),
                )
                .await?;
            }
        }
    }

    Ok(())
}
