//! Dispatch batcher.
//!
//! Takes one launchable campaign, resolves a payload per eligible recipient,
//! and publishes the results to the external queue in batches. Per-recipient
//! failures never abort the campaign; failed queue publishes are recorded on
//! the delivery row and left for the retry subsystem.

use anyhow::Context;
use smscore::payload::generate_payload;
use db::models::{Campaign, CampaignStatus, MessageStatus};
use tracing::{error, info, warn};

use crate::queue::{chunk_batches, DispatchEnvelope};
use crate::DispatchState;

#[derive(Debug, Default)]
pub struct CampaignRunReport {
    pub dispatched: usize,
    pub generation_failures: usize,
    pub publish_failures: usize,
}

/// Launch a campaign: claim it, resolve payloads, publish, report.
///
/// On an unhandled processing error the campaign is rolled back to
/// `asset_generated` so a later scheduler pass retries the whole campaign.
pub async fn process_campaign(
    state: &DispatchState,
    campaign: &Campaign,
) -> anyhow::Result<CampaignRunReport> {
    if campaign.status == CampaignStatus::AssetGenerated
        && !db::queries::campaigns::transition(
            &state.db,
            &campaign.id,
            CampaignStatus::AssetGenerated,
            CampaignStatus::ReadyToLaunch,
        )
        .await?
    {
        // Another pass claimed the campaign first.
        return Ok(CampaignRunReport::default());
    }

    if !db::queries::campaigns::transition(
        &state.db,
        &campaign.id,
        CampaignStatus::ReadyToLaunch,
        CampaignStatus::Running,
    )
    .await?
    {
        return Ok(CampaignRunReport::default());
    }

    match dispatch_audience(state, campaign).await {
        Ok(report) => {
            info!(
                campaign_id = %campaign.id,
                dispatched = report.dispatched,
                generation_failures = report.generation_failures,
                publish_failures = report.publish_failures,
                "campaign dispatched"
            );
            Ok(report)
        }
        Err(err) => {
            error!(campaign_id = %campaign.id, error = %err, "campaign dispatch failed, rolling back");
            db::queries::campaigns::rollback_to_asset_generated(&state.db, &campaign.id).await?;
            Err(err)
        }
    }
}

async fn dispatch_audience(
    state: &DispatchState,
    campaign: &Campaign,
) -> anyhow::Result<CampaignRunReport> {
    let template = db::queries::templates::get_by_id(&state.db, &campaign.template_id)
        .await?
        .context("campaign template not found")?;
    let view = template.view();
    let asset_required = view.requires_generated_asset();

    let members =
        db::queries::audience::list_eligible_for_send(&state.db, &campaign.id, asset_required)
            .await?;

    let mut report = CampaignRunReport::default();
    let mut envelopes = Vec::with_capacity(members.len());

    for member in &members {
        let recipient = member.recipient();
        match generate_payload(&view, &recipient) {
            Ok(payload) => {
                if member.message_status != MessageStatus::ReadyToSend {
                    let from = member.message_status;
                    let advanced = db::queries::audience::update_message_status(
                        &state.db,
                        &member.id,
                        from,
                        MessageStatus::ReadyToSend,
                        None,
                    )
                    .await?;
                    if !advanced {
                        // Row moved under us, leave it for the next pass.
                        continue;
                    }
                }

                let message_id = format!("msg_{}", nanoid::nanoid!(12));
                let message = db::queries::messages::create_outbound(
                    &state.db,
                    &message_id,
                    &campaign.organization_id,
                    &campaign.id,
                    &member.id,
                    Some(&campaign.template_id),
                    payload.content_summary(),
                )
                .await?;

                envelopes.push(DispatchEnvelope {
                    message_id: message.id,
                    campaign_id: campaign.id.clone(),
                    audience_member_id: member.id.clone(),
                    organization_id: campaign.organization_id.clone(),
                    attempt: 0,
                    payload,
                });
            }
            Err(err) => {
                warn!(
                    campaign_id = %campaign.id,
                    audience_member_id = %member.id,
                    error = %err,
                    "payload generation failed"
                );
                db::queries::audience::update_message_status(
                    &state.db,
                    &member.id,
                    member.message_status,
                    MessageStatus::Failed,
                    Some(&err.to_string()),
                )
                .await?;
                db::queries::campaigns::increment_counts(&state.db, &campaign.id, 0, 0, 0, 0, 1)
                    .await?;
                report.generation_failures += 1;
            }
        }
    }

    for batch in chunk_batches(envelopes) {
        let outcome = state
            .queue
            .publish_batch(&state.settings.dispatch_queue, &batch)
            .await;

        report.dispatched += outcome.successful.len();

        for failed in outcome.failed {
            warn!(
                campaign_id = %campaign.id,
                message_id = %failed.id,
                error = %failed.error,
                "queue publish failed, leaving for retry subsystem"
            );
            db::queries::messages::mark_failed(
                &state.db,
                &failed.id,
                &format!("queue publish failed: {}", failed.error),
            )
            .await?;
            report.publish_failures += 1;
        }
    }

    Ok(report)
}
