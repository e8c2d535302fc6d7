//! Axum REST handlers for campaigns, audience preview, recipients and
//! campaign groups.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use campaign_audience::AudiencePreview;
use campaign_core::dispatch::RecipientStatusUpdate;
use campaign_core::error::CampaignError;
use campaign_core::types::Campaign;
use campaign_orchestration::{
    CampaignEngine, CreateCampaignRequest, CreateGroupRequest, DispatchBatch, GroupActionResult,
    GroupCoordinator, GroupView, PreviewAudienceRequest, RecipientPage, RecipientQuery,
    StatusUpdateOutcome, UpdateCampaignRequest,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::Caller;
use crate::models::*;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub engine: Arc<CampaignEngine>,
    pub groups: Arc<GroupCoordinator>,
    pub node_id: String,
    pub start_time: Instant,
}

impl ManagementState {
    pub fn new(engine: Arc<CampaignEngine>, node_id: String) -> Self {
        Self {
            groups: Arc::new(GroupCoordinator::new(engine.clone())),
            engine,
            node_id,
            start_time: Instant::now(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map an engine error onto an HTTP status, keeping its message verbatim.
pub fn api_error(err: CampaignError) -> ApiError {
    let status = match &err {
        CampaignError::Precondition(_) => StatusCode::CONFLICT,
        CampaignError::Forbidden(_) => StatusCode::FORBIDDEN,
        CampaignError::NotFound(_) => StatusCode::NOT_FOUND,
        CampaignError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    metrics::counter!("management.errors", "code" => err.code()).increment(1);
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
        }),
    )
}

// ─── Operational ───────────────────────────────────────────────────────────

pub async fn health_check(State(state): State<ManagementState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Vec<Campaign>> {
    state
        .engine
        .list_campaigns(&auth, &workspace_id)
        .map(Json)
        .map_err(api_error)
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    let campaign = state
        .engine
        .create_campaign(&auth, workspace_id, req)
        .map_err(api_error)?;
    metrics::counter!("management.campaigns.created").increment(1);
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn preview_audience(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<PreviewAudienceRequest>,
) -> ApiResult<AudiencePreview> {
    state
        .engine
        .preview_audience(&auth, workspace_id, req)
        .map(Json)
        .map_err(api_error)
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    state
        .engine
        .get_campaign(&auth, &id)
        .map(Json)
        .map_err(api_error)
}

pub async fn update_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> ApiResult<Campaign> {
    state
        .engine
        .update_campaign(&auth, &id, req)
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .delete_campaign(&auth, &id)
        .map_err(api_error)?;
    metrics::counter!("management.campaigns.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn launch_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    state
        .engine
        .launch_campaign(&auth, &id)
        .map(Json)
        .map_err(api_error)
}

pub async fn pause_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    state
        .engine
        .pause_campaign(&auth, &id)
        .map(Json)
        .map_err(api_error)
}

pub async fn resume_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    state
        .engine
        .resume_campaign(&auth, &id)
        .map(Json)
        .map_err(api_error)
}

pub async fn cancel_campaign(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    state
        .engine
        .cancel_campaign(&auth, &id)
        .map(Json)
        .map_err(api_error)
}

// ─── Recipients ────────────────────────────────────────────────────────────

pub async fn list_recipients(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<RecipientQuery>,
) -> ApiResult<RecipientPage> {
    state
        .engine
        .get_recipients(&auth, &id, query)
        .map(Json)
        .map_err(api_error)
}

/// Worker-facing: record a delivery outcome for one recipient.
pub async fn report_status(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusReportRequest>,
) -> ApiResult<StatusUpdateOutcome> {
    let update = RecipientStatusUpdate {
        campaign_id: id,
        contact_id: req.contact_id,
        status: req.status,
        occurred_at: req.occurred_at.unwrap_or_else(Utc::now),
        error_message: req.error_message,
    };
    state
        .engine
        .apply_status_update(update)
        .map(Json)
        .map_err(api_error)
}

/// Worker-facing claim of the next pending recipients. Unreachable rows
/// are failed as a side effect, so this is a POST.
pub async fn dispatch_batch(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
    Query(query): Query<BatchQuery>,
) -> ApiResult<DispatchBatch> {
    state
        .engine
        .next_dispatch_batch(&id, query.limit)
        .map(Json)
        .map_err(api_error)
}

// ─── Campaign groups ───────────────────────────────────────────────────────

pub async fn list_groups(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
) -> Json<Vec<GroupView>> {
    Json(state.groups.list_groups(&auth))
}

pub async fn create_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupView>), ApiError> {
    let group = state.groups.create_group(&auth, req).map_err(api_error)?;
    metrics::counter!("management.groups.created").increment(1);
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<GroupView> {
    state.groups.get_group(&auth, &id).map(Json).map_err(api_error)
}

pub async fn delete_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.groups.delete_group(&auth, &id).map_err(api_error)?;
    metrics::counter!("management.groups.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn launch_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<GroupActionResult> {
    state.groups.launch_group(&auth, &id).map(Json).map_err(api_error)
}

pub async fn pause_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<GroupActionResult> {
    state.groups.pause_group(&auth, &id).map(Json).map_err(api_error)
}

pub async fn resume_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<GroupActionResult> {
    state.groups.resume_group(&auth, &id).map(Json).map_err(api_error)
}

pub async fn cancel_group(
    State(state): State<ManagementState>,
    Caller(auth): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<GroupActionResult> {
    state.groups.cancel_group(&auth, &id).map(Json).map_err(api_error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_http_statuses() {
        let cases = [
            (CampaignError::precondition("Can only pause a sending campaign"), StatusCode::CONFLICT),
            (CampaignError::forbidden("No access"), StatusCode::FORBIDDEN),
            (CampaignError::not_found("Campaign"), StatusCode::NOT_FOUND),
            (CampaignError::validation("bad"), StatusCode::BAD_REQUEST),
            (CampaignError::Dispatch("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = api_error(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn precondition_message_is_passed_through() {
        let (_, Json(body)) = api_error(CampaignError::precondition("Can only pause a sending campaign"));
        assert_eq!(body.error, "precondition_failed");
        assert_eq!(body.message, "Can only pause a sending campaign");
    }
}
