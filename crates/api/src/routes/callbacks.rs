use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use smscore::types::MessageStatus as DomainMessageStatus;
use db::models::MessageStatus;
use dispatch::DispatchState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/callbacks/delivery", post(delivery_callback))
        .route("/v1/callbacks/inbound", post(inbound_callback))
        .route("/v1/callbacks/assets", post(asset_callback))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DeliveryEvent {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryEvent {
    fn target(self) -> DomainMessageStatus {
        match self {
            DeliveryEvent::Sent => DomainMessageStatus::Sent,
            DeliveryEvent::Delivered => DomainMessageStatus::Delivered,
            DeliveryEvent::Read => DomainMessageStatus::Read,
            DeliveryEvent::Failed => DomainMessageStatus::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryCallbackRequest {
    message_id: String,
    status: DeliveryEvent,
    provider_message_id: Option<String>,
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundCallbackRequest {
    audience_member_id: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetCallbackRequest {
    audience_member_id: String,
    success: bool,
    #[serde(default)]
    generated_asset_urls: HashMap<String, String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackResponse {
    applied: bool,
}

/// Provider delivery status callback. Callbacks arrive at least once and may
/// be reordered; a stale or repeated status is acknowledged without effect so
/// the provider stops redelivering it.
async fn delivery_callback(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryCallbackRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let message = db::queries::messages::get_by_id(&state.db, &payload.message_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("message not found".to_string()))?;
    let member = db::queries::audience::get_by_id(&state.db, &message.audience_member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("audience member not found".to_string()))?;

    let current: DomainMessageStatus = member.message_status.into();
    let target = payload.status.target();
    if !current.can_advance_to(target) {
        info!(
            message_id = %payload.message_id,
            current = %current,
            target = %target,
            "stale delivery callback ignored"
        );
        return Ok(Json(CallbackResponse { applied: false }));
    }

    let advanced = db::queries::audience::update_message_status(
        &state.db,
        &member.id,
        member.message_status,
        target.into(),
        payload.failure_reason.as_deref(),
    )
    .await?;
    if !advanced {
        // Another callback won the rung between our read and the update.
        return Ok(Json(CallbackResponse { applied: false }));
    }

    match target {
        DomainMessageStatus::Failed => {
            let reason = payload
                .failure_reason
                .as_deref()
                .unwrap_or("provider reported failure");
            db::queries::messages::mark_failed(&state.db, &message.id, reason).await?;
        }
        _ => {
            db::queries::messages::update_status(
                &state.db,
                &message.id,
                MessageStatus::from(target),
                payload.provider_message_id.as_deref(),
            )
            .await?;
        }
    }

    let (sent, delivered, read, failed) = match target {
        DomainMessageStatus::Sent => (1, 0, 0, 0),
        DomainMessageStatus::Delivered => (0, 1, 0, 0),
        DomainMessageStatus::Read => (0, 0, 1, 0),
        DomainMessageStatus::Failed => (0, 0, 0, 1),
        _ => (0, 0, 0, 0),
    };
    db::queries::campaigns::increment_counts(
        &state.db,
        &member.campaign_id,
        sent,
        delivered,
        read,
        0,
        failed,
    )
    .await?;

    info!(
        message_id = %payload.message_id,
        campaign_id = %member.campaign_id,
        status = %target,
        "delivery callback applied"
    );
    Ok(Json(CallbackResponse { applied: true }))
}

/// Inbound reply from a campaign recipient.
async fn inbound_callback(
    State(state): State<AppState>,
    Json(payload): Json<InboundCallbackRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".to_string()));
    }

    let member = db::queries::audience::get_by_id(&state.db, &payload.audience_member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("audience member not found".to_string()))?;

    let id = format!("msg_{}", nanoid::nanoid!(12));
    db::queries::messages::create_inbound(
        &state.db,
        &id,
        &member.organization_id,
        &member.campaign_id,
        &member.id,
        &payload.content,
    )
    .await?;
    db::queries::campaigns::increment_counts(&state.db, &member.campaign_id, 0, 0, 0, 1, 0)
        .await?;

    info!(
        campaign_id = %member.campaign_id,
        audience_member_id = %member.id,
        "inbound reply recorded"
    );
    Ok(Json(CallbackResponse { applied: true }))
}

/// Result callback from the asset generation collaborator. After each result
/// the campaign-level completion check runs, so the campaign advances as soon
/// as the last recipient settles instead of waiting for the next tick.
async fn asset_callback(
    State(state): State<AppState>,
    Json(payload): Json<AssetCallbackRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let member = db::queries::audience::get_by_id(&state.db, &payload.audience_member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("audience member not found".to_string()))?;

    let applied = if payload.success {
        if payload.generated_asset_urls.is_empty() {
            return Err(ApiError::BadRequest(
                "generatedAssetUrls required on success".to_string(),
            ));
        }
        db::queries::audience::complete_asset_generation(
            &state.db,
            &member.id,
            &payload.generated_asset_urls,
        )
        .await?
    } else {
        let error = payload.error.as_deref().unwrap_or("asset generation failed");
        db::queries::audience::fail_asset_generation(&state.db, &member.id, error).await?
    };

    if !applied {
        info!(
            audience_member_id = %member.id,
            "asset callback for recipient not in processing, ignored"
        );
        return Ok(Json(CallbackResponse { applied: false }));
    }

    if let Some(campaign) =
        db::queries::campaigns::get_by_id(&state.db, &member.campaign_id).await?
    {
        let dispatch_state = DispatchState {
            db: state.db.clone(),
            queue: state.queue.clone(),
            settings: state.settings.clone(),
        };
        if let Err(err) = dispatch::assets::check_completion(&dispatch_state, &campaign).await {
            // The scheduler re-runs this check every tick.
            warn!(campaign_id = %campaign.id, error = %err, "asset completion check failed");
        }
    }

    Ok(Json(CallbackResponse { applied: true }))
}
