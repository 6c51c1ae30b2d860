use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::{error::ApiResult, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/admin/scheduler", get(scheduler_status))
        .route("/v1/admin/scheduler/start", post(start_scheduler))
        .route("/v1/admin/scheduler/stop", post(stop_scheduler))
        .route("/v1/admin/scheduler/tick", post(run_tick))
        .route("/v1/admin/retries/run", post(run_retries))
        .route("/v1/admin/queues", get(queue_depths))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulerStatusResponse {
    scheduler_running: bool,
    scheduler_interval_secs: u64,
    retry_worker_running: bool,
    retry_interval_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TickResponse {
    campaigns_seen: usize,
    campaigns_failed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryRunResponse {
    examined: usize,
    requeued: usize,
    exhausted: usize,
    publish_failures: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueDepthsResponse {
    dispatch_queue: String,
    dispatch_depth: i64,
    asset_queue: String,
    asset_depth: i64,
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatusResponse> {
    Json(SchedulerStatusResponse {
        scheduler_running: state.scheduler.is_running(),
        scheduler_interval_secs: state.scheduler.interval().as_secs(),
        retry_worker_running: state.retrier.is_running(),
        retry_interval_secs: state.retrier.interval().as_secs(),
    })
}

async fn start_scheduler(State(state): State<AppState>) -> Json<SchedulerStatusResponse> {
    state.scheduler.start();
    state.retrier.start();
    scheduler_status(State(state)).await
}

async fn stop_scheduler(State(state): State<AppState>) -> Json<SchedulerStatusResponse> {
    state.scheduler.stop();
    state.retrier.stop();
    scheduler_status(State(state)).await
}

/// Manual "check now": one synchronous scheduler pass, outside the loop.
async fn run_tick(State(state): State<AppState>) -> ApiResult<Json<TickResponse>> {
    let report = state.scheduler.tick().await?;
    info!(
        campaigns_seen = report.campaigns_seen,
        campaigns_failed = report.campaigns_failed,
        "manual scheduler tick"
    );
    Ok(Json(TickResponse {
        campaigns_seen: report.campaigns_seen,
        campaigns_failed: report.campaigns_failed,
    }))
}

/// Manual retry pass, outside the loop.
async fn run_retries(State(state): State<AppState>) -> ApiResult<Json<RetryRunResponse>> {
    let report = state.retrier.run_once().await?;
    Ok(Json(RetryRunResponse {
        examined: report.examined,
        requeued: report.requeued,
        exhausted: report.exhausted,
        publish_failures: report.publish_failures,
    }))
}

async fn queue_depths(State(state): State<AppState>) -> ApiResult<Json<QueueDepthsResponse>> {
    let dispatch_depth = state.queue.depth(&state.settings.dispatch_queue).await?;
    let asset_depth = state.queue.depth(&state.settings.asset_queue).await?;

    Ok(Json(QueueDepthsResponse {
        dispatch_queue: state.settings.dispatch_queue.clone(),
        dispatch_depth,
        asset_queue: state.settings.asset_queue.clone(),
        asset_depth,
    }))
}
