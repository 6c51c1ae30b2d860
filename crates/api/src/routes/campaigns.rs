use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use smscore::lifecycle;
use smscore::types::CampaignStatus as DomainStatus;
use db::models::{Campaign, CampaignStatus, CampaignType};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/campaigns", post(create_campaign))
        .route(
            "/v1/campaigns/{id}",
            get(get_campaign).patch(update_campaign).delete(delete_campaign),
        )
        .route("/v1/campaigns/{id}/submit", post(submit_campaign))
        .route("/v1/campaigns/{id}/approve", post(approve_campaign))
        .route("/v1/campaigns/{id}/reject", post(reject_campaign))
        .route("/v1/campaigns/{id}/pause", post(pause_campaign))
        .route("/v1/campaigns/{id}/resume", post(resume_campaign))
        .route("/v1/campaigns/{id}/cancel", post(cancel_campaign))
        .route("/v1/campaigns/{id}/complete", post(complete_campaign))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCampaignRequest {
    organization_id: String,
    template_id: String,
    name: String,
    campaign_type: CampaignType,
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCampaignRequest {
    name: Option<String>,
    template_id: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRequest {
    actor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectRequest {
    actor: String,
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    id: String,
    status: CampaignStatus,
}

async fn create_campaign(
    State(state): State<AppState>,
    Json(payload): Json<CreateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name required".to_string()));
    }

    match payload.campaign_type {
        CampaignType::Scheduled => match payload.scheduled_at {
            None => {
                return Err(ApiError::BadRequest(
                    "scheduledAt required for scheduled campaigns".to_string(),
                ))
            }
            Some(at) if at <= Utc::now() => {
                return Err(ApiError::BadRequest(
                    "scheduledAt must be in the future".to_string(),
                ))
            }
            Some(_) => {}
        },
        _ => {
            if payload.scheduled_at.is_some() {
                return Err(ApiError::BadRequest(
                    "scheduledAt only valid for scheduled campaigns".to_string(),
                ));
            }
        }
    }

    let template = db::queries::templates::get_by_id(&state.db, &payload.template_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("template not found".to_string()))?;
    if !template.is_usable() {
        return Err(ApiError::Conflict(
            "template is not approved for campaign use".to_string(),
        ));
    }

    let id = format!("cmp_{}", nanoid::nanoid!(12));
    let campaign = db::queries::campaigns::create(
        &state.db,
        &id,
        &payload.organization_id,
        &payload.template_id,
        &payload.name,
        payload.campaign_type,
        payload.scheduled_at,
    )
    .await?;

    Ok(Json(campaign))
}

async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    let campaign = load(&state, &id).await?;
    Ok(Json(campaign))
}

async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_update(campaign.status.into())?;

    let template_id = payload
        .template_id
        .unwrap_or_else(|| campaign.template_id.clone());
    if template_id != campaign.template_id {
        let template = db::queries::templates::get_by_id(&state.db, &template_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("template not found".to_string()))?;
        if !template.is_usable() {
            return Err(ApiError::Conflict(
                "template is not approved for campaign use".to_string(),
            ));
        }
    }

    let name = payload.name.unwrap_or_else(|| campaign.name.clone());
    let scheduled_at = payload.scheduled_at.or(campaign.scheduled_at);

    db::queries::campaigns::update_details(&state.db, &id, &name, &template_id, scheduled_at)
        .await?;
    let campaign = load(&state, &id).await?;
    Ok(Json(campaign))
}

async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_delete(campaign.status.into(), campaign.campaign_type.into())?;

    db::queries::campaigns::delete(&state.db, &id).await?;
    info!(campaign_id = %id, "campaign deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn submit_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_submit(campaign.status.into(), campaign.total_targeted_audience)?;

    transition(&state, &campaign, CampaignStatus::PendingApproval).await?;
    info!(campaign_id = %id, from = ?campaign.status, "campaign submitted for approval");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::PendingApproval,
    }))
}

async fn approve_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Approved)?;

    if !db::queries::campaigns::approve(&state.db, &id, &payload.actor).await? {
        return Err(ApiError::Conflict(
            "campaign is no longer pending approval".to_string(),
        ));
    }
    info!(campaign_id = %id, actor = %payload.actor, "campaign approved");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Approved,
    }))
}

async fn reject_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<Json<StatusResponse>> {
    lifecycle::check_reject_reason(&payload.reason)?;
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Rejected)?;

    if !db::queries::campaigns::reject(&state.db, &id, &payload.actor, &payload.reason).await? {
        return Err(ApiError::Conflict(
            "campaign is no longer pending approval".to_string(),
        ));
    }
    info!(campaign_id = %id, actor = %payload.actor, reason = %payload.reason, "campaign rejected");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Rejected,
    }))
}

async fn pause_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Paused)?;
    transition(&state, &campaign, CampaignStatus::Paused).await?;
    info!(campaign_id = %id, "campaign paused");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Paused,
    }))
}

async fn resume_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Running)?;
    transition(&state, &campaign, CampaignStatus::Running).await?;
    info!(campaign_id = %id, "campaign resumed");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Running,
    }))
}

async fn cancel_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Cancelled)?;
    transition(&state, &campaign, CampaignStatus::Cancelled).await?;
    info!(campaign_id = %id, "campaign cancelled");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Cancelled,
    }))
}

async fn complete_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let campaign = load(&state, &id).await?;
    lifecycle::check_transition(campaign.status.into(), DomainStatus::Completed)?;
    transition(&state, &campaign, CampaignStatus::Completed).await?;
    info!(campaign_id = %id, "campaign completed");
    Ok(Json(StatusResponse {
        id,
        status: CampaignStatus::Completed,
    }))
}

async fn load(state: &AppState, id: &str) -> ApiResult<Campaign> {
    db::queries::campaigns::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("campaign not found".to_string()))
}

async fn transition(
    state: &AppState,
    campaign: &Campaign,
    to: CampaignStatus,
) -> ApiResult<()> {
    if !db::queries::campaigns::transition(&state.db, &campaign.id, campaign.status, to).await? {
        return Err(ApiError::Conflict(
            "campaign status changed concurrently".to_string(),
        ));
    }
    Ok(())
}
