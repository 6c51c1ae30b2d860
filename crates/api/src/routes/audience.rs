use axum::{
    extract::{Path, Query, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use smscore::lifecycle;
use smscore::phone::normalize_msisdn;
use db::models::AudienceMember;
use db::queries::audience::{AudienceRowError, NewAudienceMember};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/campaigns/{id}/audience", post(add_audience).get(list_audience))
        .route(
            "/v1/campaigns/{id}/audience/{member_id}",
            delete(remove_member).get(get_member),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudienceRowRequest {
    name: String,
    msisdn: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddAudienceRequest {
    members: Vec<AudienceRowRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddAudienceResponse {
    added: Vec<AudienceMember>,
    errors: Vec<AudienceRowError>,
    total_targeted_audience: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveResponse {
    removed: bool,
    total_targeted_audience: i32,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Batch attach. Rows that fail phone normalization or collide with an
/// existing msisdn for this campaign are reported individually; the rest
/// are inserted.
async fn add_audience(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AddAudienceRequest>,
) -> ApiResult<Json<AddAudienceResponse>> {
    if payload.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".to_string()));
    }

    let campaign = db::queries::campaigns::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("campaign not found".to_string()))?;
    lifecycle::check_add_audience(campaign.status.into())?;

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for member in payload.members {
        if member.name.trim().is_empty() {
            errors.push(AudienceRowError {
                msisdn: member.msisdn,
                error: "name required".to_string(),
            });
            continue;
        }
        let msisdn = match normalize_msisdn(&member.msisdn) {
            Ok(normalized) => normalized,
            Err(err) => {
                errors.push(AudienceRowError {
                    msisdn: member.msisdn,
                    error: err.to_string(),
                });
                continue;
            }
        };
        if !seen.insert(msisdn.clone()) {
            errors.push(AudienceRowError {
                msisdn,
                error: "duplicate phone number in request".to_string(),
            });
            continue;
        }
        rows.push(NewAudienceMember {
            id: format!("aud_{}", nanoid::nanoid!(12)),
            master_id: format!("mst_{}", nanoid::nanoid!(12)),
            name: member.name,
            msisdn,
            attributes: member.attributes,
        });
    }

    let outcome = db::queries::audience::add_batch(
        &state.db,
        &id,
        &campaign.organization_id,
        rows,
    )
    .await?;

    errors.extend(outcome.errors);
    info!(
        campaign_id = %id,
        added = outcome.added.len(),
        rejected = errors.len(),
        total = outcome.total_targeted_audience,
        "audience batch attached"
    );

    Ok(Json(AddAudienceResponse {
        added: outcome.added,
        errors,
        total_targeted_audience: outcome.total_targeted_audience,
    }))
}

async fn list_audience(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<AudienceMember>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let members = db::queries::audience::list_by_campaign(&state.db, &id, limit, offset).await?;
    Ok(Json(members))
}

async fn get_member(
    State(state): State<AppState>,
    Path((_, member_id)): Path<(String, String)>,
) -> ApiResult<Json<AudienceMember>> {
    let member = db::queries::audience::get_by_id(&state.db, &member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("audience member not found".to_string()))?;
    Ok(Json(member))
}

async fn remove_member(
    State(state): State<AppState>,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<RemoveResponse>> {
    let campaign = db::queries::campaigns::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("campaign not found".to_string()))?;
    lifecycle::check_remove_audience(campaign.status.into())?;

    let total = db::queries::audience::remove(&state.db, &id, &member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("audience member not found".to_string()))?;

    info!(campaign_id = %id, member_id = %member_id, total, "audience member removed");
    Ok(Json(RemoveResponse {
        removed: true,
        total_targeted_audience: total,
    }))
}
