use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use smscore::types::TemplateComponent;
use db::models::Template;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/templates", post(create_template).get(list_templates))
        .route("/v1/templates/{id}", get(get_template))
        .route("/v1/templates/{id}/submit", post(submit_template))
        .route("/v1/templates/{id}/approve", post(approve_content))
        .route("/v1/templates/{id}/reject", post(reject_content))
        .route("/v1/templates/{id}/admin-approve", post(admin_approve))
        .route("/v1/templates/{id}/admin-reject", post(admin_reject))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTemplateRequest {
    organization_id: String,
    name: String,
    language: String,
    category: Option<String>,
    #[serde(default)]
    components: Vec<TemplateComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTemplatesQuery {
    organization_id: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectTemplateRequest {
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminApproveRequest {
    #[serde(default)]
    parameters: HashMap<String, String>,
    #[serde(default)]
    button_mappings: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatedResponse {
    id: String,
    updated: bool,
}

async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name required".to_string()));
    }
    if payload.language.trim().is_empty() {
        return Err(ApiError::BadRequest("language required".to_string()));
    }

    let id = format!("tpl_{}", nanoid::nanoid!(12));
    let template = db::queries::templates::create(
        &state.db,
        &id,
        &payload.organization_id,
        &payload.name,
        &payload.language,
        payload.category.as_deref(),
        &payload.components,
    )
    .await?;

    Ok(Json(template))
}

async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Template>> {
    let template = db::queries::templates::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("template not found".to_string()))?;
    Ok(Json(template))
}

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
) -> ApiResult<Json<Vec<Template>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let templates = db::queries::templates::list_by_organization(
        &state.db,
        &query.organization_id,
        limit,
        offset,
    )
    .await?;
    Ok(Json(templates))
}

async fn submit_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UpdatedResponse>> {
    if !db::queries::templates::submit(&state.db, &id).await? {
        return Err(ApiError::Conflict(
            "template is not in a submittable state".to_string(),
        ));
    }
    info!(template_id = %id, "template submitted for content approval");
    Ok(Json(UpdatedResponse { id, updated: true }))
}

async fn approve_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UpdatedResponse>> {
    if !db::queries::templates::approve_content(&state.db, &id).await? {
        return Err(ApiError::Conflict(
            "template is not pending content approval".to_string(),
        ));
    }
    info!(template_id = %id, "template content approved");
    Ok(Json(UpdatedResponse { id, updated: true }))
}

async fn reject_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectTemplateRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason required".to_string()));
    }
    if !db::queries::templates::reject_content(&state.db, &id, &payload.reason).await? {
        return Err(ApiError::Conflict(
            "template is not pending content approval".to_string(),
        ));
    }
    info!(template_id = %id, reason = %payload.reason, "template content rejected");
    Ok(Json(UpdatedResponse { id, updated: true }))
}

/// Second gate: binds placeholder and button mappings. A template is only
/// usable by campaigns once both gates are open.
async fn admin_approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AdminApproveRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    let template = db::queries::templates::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("template not found".to_string()))?;

    // Every positional placeholder in the components must have a mapping.
    let view = template.view();
    for component in &view.components {
        if let Some(text) = &component.text {
            for n in positional_tokens(text) {
                if !payload.parameters.contains_key(&n) {
                    return Err(ApiError::BadRequest(format!(
                        "missing parameter mapping for placeholder {{{{{n}}}}}"
                    )));
                }
            }
        }
    }

    if !db::queries::templates::admin_approve(
        &state.db,
        &id,
        &payload.parameters,
        &payload.button_mappings,
    )
    .await?
    {
        return Err(ApiError::Conflict(
            "template admin approval already granted".to_string(),
        ));
    }
    info!(template_id = %id, "template admin approved");
    Ok(Json(UpdatedResponse { id, updated: true }))
}

async fn admin_reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectTemplateRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason required".to_string()));
    }
    if !db::queries::templates::admin_reject(&state.db, &id, &payload.reason).await? {
        return Err(ApiError::Conflict(
            "template admin approval is not pending".to_string(),
        ));
    }
    info!(template_id = %id, reason = %payload.reason, "template admin rejected");
    Ok(Json(UpdatedResponse { id, updated: true }))
}

/// Positional tokens (`{{1}}`, `{{2}}`, ...) in a component body.
fn positional_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let tail = &rest[start + 2..];
        match tail.find("}}") {
            Some(end) => {
                let token = &tail[..end];
                if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
                    tokens.push(token.to_string());
                }
                rest = &tail[end + 2..];
            }
            None => break,
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::positional_tokens;

    #[test]
    fn extracts_positional_tokens_only() {
        let tokens = positional_tokens("Hi {{1}}, your {{order_id}} ships {{2}}");
        assert_eq!(tokens, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn unterminated_token_stops_scan() {
        assert!(positional_tokens("broken {{1").is_empty());
    }
}
