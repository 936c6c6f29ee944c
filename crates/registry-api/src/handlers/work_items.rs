use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use registry_core::models::{Stage, WorkItem};
use registry_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedForm};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct RequeueOptionsResponse {
    pub work_item: WorkItem,
    /// Stages the item may be sent back to, in processing order
    pub stages: Vec<Stage>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequeueForm {
    /// Stage name as shown in the options, e.g. "Reingest Check"
    #[validate(length(min = 1))]
    pub stage: String,
}

#[utoipa::path(
    get,
    path = "/work_items/show/{id}",
    tag = "work_items",
    params(("id" = i64, Path, description = "Work item ID")),
    responses(
        (status = 200, description = "Work item", body = WorkItem),
        (status = 403, description = "Not a member of the institution", body = ErrorResponse),
        (status = 404, description = "Work item not found", body = ErrorResponse)
    )
)]
pub async fn show(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let item = state
        .ctx
        .work_items
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Work item {} not found", id)))?;
    if !(user.0.is_sys_admin() || user.0.belongs_to(item.institution_id)) {
        return Err(AppError::PermissionDenied(
            "You are not allowed to view this work item".to_string(),
        )
        .into());
    }
    Ok(Json(item))
}

#[utoipa::path(
    get,
    path = "/work_items/requeue/{id}",
    tag = "work_items",
    params(("id" = i64, Path, description = "Work item ID")),
    responses(
        (status = 200, description = "Legal requeue stages", body = RequeueOptionsResponse),
        (status = 400, description = "Item has completed", body = ErrorResponse),
        (status = 403, description = "System administrators only", body = ErrorResponse)
    )
)]
pub async fn requeue_options(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (work_item, stages) = state.requeue.options(id, &user.0).await?;
    Ok(Json(RequeueOptionsResponse { work_item, stages }))
}

#[utoipa::path(
    put,
    path = "/work_items/requeue/{id}",
    tag = "work_items",
    params(("id" = i64, Path, description = "Work item ID")),
    request_body(content = RequeueForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Item reset and queued again", body = WorkItem),
        (status = 400, description = "Unknown stage or completed item", body = ErrorResponse),
        (status = 403, description = "System administrators only", body = ErrorResponse),
        (status = 500, description = "Stage is not a legal target for this item", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, form), fields(user_id = user.0.id, work_item_id = id))]
pub async fn requeue(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    ValidatedForm(form): ValidatedForm<RequeueForm>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stage = Stage::from_str(form.stage.trim())
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let item = state.requeue.requeue(id, stage, &user.0).await?;
    Ok(Json(item))
}
