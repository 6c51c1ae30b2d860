//! Campaign scheduler / poller.
//!
//! A cooperative fixed-interval loop. Each tick discovers campaigns with due
//! work and drives the asset and dispatch pipelines; one campaign's failure
//! never aborts the tick. Sustained tick-level failures back the loop off to
//! a longer wait instead of busy-looping.

use chrono::Utc;
use db::models::CampaignStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{assets, batcher, DispatchState};

/// Consecutive failed ticks before the loop stretches its wait.
const BACKOFF_THRESHOLD: u32 = 3;
const BACKOFF_MULTIPLIER: u32 = 10;

#[derive(Debug, Default)]
pub struct TickReport {
    pub campaigns_seen: usize,
    pub campaigns_failed: usize,
}

pub struct Scheduler {
    state: DispatchState,
    running: Arc<AtomicBool>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(state: DispatchState) -> Arc<Self> {
        let interval = Duration::from_secs(state.settings.scheduler_interval_secs);
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

    /// Start the polling loop. Idempotent: starting a running scheduler
    /// logs and no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("scheduler already running");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });
    }

    /// Request a stop. The current tick finishes; the next iteration exits.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("scheduler stopping");
        } else {
            info!("scheduler already stopped");
        }
    }

    async fn run_loop(&self) {
        let mut consecutive_failures: u32 = 0;
        while self.running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(report) => {
                    consecutive_failures = 0;
                    if report.campaigns_seen > 0 {
                        info!(
                            campaigns_seen = report.campaigns_seen,
                            campaigns_failed = report.campaigns_failed,
                            "scheduler tick complete"
                        );
                    }
                }
                Err(err) => {
                    consecutive_failures += 1;
                    error!(error = %err, consecutive_failures, "scheduler tick failed");
                }
            }

            let wait = if consecutive_failures >= BACKOFF_THRESHOLD {
                self.interval * BACKOFF_MULTIPLIER
            } else {
                self.interval
            };
            tokio::time::sleep(wait).await;
        }
        info!("scheduler stopped");
    }

    /// One synchronous pass over all due campaigns. Also exposed through the
    /// operational surface as a manual "check now".
    pub async fn tick(&self) -> anyhow::Result<TickReport> {
        let now = Utc::now();
        let due = db::queries::campaigns::find_due(&self.state.db, now).await?;

        let mut report = TickReport {
            campaigns_seen: due.len(),
            ..TickReport::default()
        };

        for campaign in due {
            if let Err(err) = self.drive(&campaign).await {
                report.campaigns_failed += 1;
                warn!(campaign_id = %campaign.id, error = %err, "campaign processing failed");
            }
        }

        Ok(report)
    }

    async fn drive(&self, campaign: &db::models::Campaign) -> anyhow::Result<()> {
        match campaign.status {
            CampaignStatus::Approved => assets::kick_off(&self.state, campaign).await,
            CampaignStatus::AssetGeneration => {
                assets::check_completion(&self.state, campaign).await
            }
            CampaignStatus::AssetGenerated | CampaignStatus::ReadyToLaunch => {
                batcher::process_campaign(&self.state, campaign)
                    .await
                    .map(|_| ())
            }
            other => {
                // find_due should not hand us anything else.
                warn!(campaign_id = %campaign.id, status = ?other, "unexpected campaign in tick");
                Ok(())
            }
        }
    }
}
