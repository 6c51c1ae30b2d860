//! Retry subsystem.
//!
//! An independently scheduled, longer-period loop. Each run claims failed
//! deliveries whose backoff has elapsed, regenerates their payloads and
//! republishes them in bounded batches; failures that exhaust the budget or
//! can no longer be regenerated are terminally failed. The run is re-entrant:
//! rows are only ever `failed` or claimed via a conditional update, so a
//! crash mid-run leaves nothing stuck in flight.

use anyhow::Context;
use chrono::Utc;
use smscore::payload::generate_payload;
use smscore::retry::is_retry_due;
use db::models::{CampaignStatus, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::queue::{chunk_batches, DispatchEnvelope};
use crate::DispatchState;

/// Upper bound of rows examined per run, to keep a run's writes bounded.
const RUN_LIMIT: i64 = 500;

#[derive(Debug, Default)]
pub struct RetryRunReport {
    pub examined: usize,
    pub requeued: usize,
    pub exhausted: usize,
    pub publish_failures: usize,
}

pub struct RetryWorker {
    state: DispatchState,
    running: Arc<AtomicBool>,
    interval: Duration,
}

impl RetryWorker {
    pub fn new(state: DispatchState) -> Arc<Self> {
        let interval = Duration::from_secs(state.settings.retry_interval_secs);
        Arc::new(Self {
            state,
            running: Arc::new(AtomicBool::new(false)),
            interval,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("retry worker already running");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "retry worker started");
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            while worker.running.load(Ordering::SeqCst) {
                if let Err(err) = worker.run_once().await {
                    error!(error = %err, "retry run failed");
                }
                tokio::time::sleep(worker.interval).await;
            }
            info!("retry worker stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One full retry pass: failed deliveries, then failed asset phases.
    pub async fn run_once(&self) -> anyhow::Result<RetryRunReport> {
        let report = self.retry_failed_deliveries().await?;
        self.reopen_failed_asset_phases().await?;

        if report.examined > 0 {
            info!(
                examined = report.examined,
                requeued = report.requeued,
                exhausted = report.exhausted,
                publish_failures = report.publish_failures,
                "retry run complete"
            );
        }
        Ok(report)
    }

    async fn retry_failed_deliveries(&self) -> anyhow::Result<RetryRunReport> {
        let max_retry_count = self.state.settings.max_retry_count;
        let now = Utc::now();
        let candidates =
            db::queries::messages::list_failed_within_budget(&self.state.db, max_retry_count, RUN_LIMIT)
                .await?;

        let mut report = RetryRunReport {
            examined: candidates.len(),
            ..RetryRunReport::default()
        };
        let mut envelopes = Vec::new();

        for message in candidates {
            let failed_at = match message.failed_at {
                Some(at) => at,
                None => continue,
            };
            if !is_retry_due(failed_at, message.retry_count, now) {
                continue;
            }

            match self.requeue(&message, max_retry_count).await {
                Ok(Some(envelope)) => {
                    report.requeued += 1;
                    envelopes.push(envelope);
                }
                Ok(None) => report.exhausted += 1,
                Err(err) => {
                    // Leave the row failed; the next run re-evaluates it.
                    warn!(message_id = %message.id, error = %err, "retry requeue failed");
                }
            }
        }

        for batch in chunk_batches(envelopes) {
            let outcome = self
                .state
                .queue
                .publish_batch(&self.state.settings.dispatch_queue, &batch)
                .await;

            for failed in outcome.failed {
                report.publish_failures += 1;
                warn!(message_id = %failed.id, error = %failed.error, "retry publish failed");
                db::queries::messages::mark_failed(
                    &self.state.db,
                    &failed.id,
                    &format!("queue publish failed: {}", failed.error),
                )
                .await?;
            }
        }

        Ok(report)
    }

    /// Rebuild the (campaign, template, recipient) triple for one failed
    /// delivery and claim it for another attempt. Returns None when the row
    /// was terminally failed instead.
    async fn requeue(
        &self,
        message: &Message,
        max_retry_count: i32,
    ) -> anyhow::Result<Option<DispatchEnvelope>> {
        let campaign = db::queries::campaigns::get_by_id(&self.state.db, &message.campaign_id)
            .await?
            .context("campaign not found")?;

        if matches!(
            campaign.status,
            CampaignStatus::Cancelled | CampaignStatus::Completed
        ) {
            db::queries::messages::mark_permanently_failed(
                &self.state.db,
                &message.id,
                "campaign is no longer active",
                max_retry_count,
            )
            .await?;
            return Ok(None);
        }

        let template = db::queries::templates::get_by_id(&self.state.db, &campaign.template_id)
            .await?
            .context("template not found")?;
        let member =
            db::queries::audience::get_by_id(&self.state.db, &message.audience_member_id)
                .await?
                .context("audience member not found")?;

        let payload = match generate_payload(&template.view(), &member.recipient()) {
            Ok(payload) => payload,
            Err(err) => {
                db::queries::messages::mark_permanently_failed(
                    &self.state.db,
                    &message.id,
                    &format!("payload regeneration failed: {err}"),
                    max_retry_count,
                )
                .await?;
                return Ok(None);
            }
        };

        let claimed = db::queries::messages::requeue_for_retry(
            &self.state.db,
            &message.id,
            message.retry_count,
            payload.content_summary(),
        )
        .await?;
        if !claimed {
            // A concurrent pass already took this row.
            return Ok(None);
        }

        // The failed delivery callback parked the recipient on the terminal
        // rung; put it back on ready_to_send or the provider's next callback
        // for this message could never apply.
        if db::queries::audience::reopen_failed_delivery(&self.state.db, &member.id).await? {
            db::queries::campaigns::increment_counts(&self.state.db, &campaign.id, 0, 0, 0, 0, -1)
                .await?;
        }

        Ok(Some(DispatchEnvelope {
            message_id: message.id.clone(),
            campaign_id: campaign.id,
            audience_member_id: member.id,
            organization_id: message.organization_id.clone(),
            attempt: message.retry_count + 1,
            payload,
        }))
    }

    /// Re-open campaign asset generation phases that failed with budget left.
    async fn reopen_failed_asset_phases(&self) -> anyhow::Result<()> {
        let campaigns = db::queries::campaigns::list_asset_failed(
            &self.state.db,
            self.state.settings.max_retry_count,
        )
        .await?;

        for campaign in campaigns {
            if let Err(err) = crate::assets::reopen(&self.state, &campaign).await {
                warn!(campaign_id = %campaign.id, error = %err, "asset phase reopen failed");
            }
        }
        Ok(())
    }
}
