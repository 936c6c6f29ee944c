//! System administrator endpoints: batch deletion and the test-only
//! shortcuts that put a deletion straight into the confirmed state.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use registry_core::models::DeletionRequest;
use registry_services::permissions::ensure_sys_admin;
use registry_services::BatchDeletionRequest;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchDeletionBody {
    #[serde(rename = "institutionID")]
    #[validate(range(min = 1))]
    pub institution_id: i64,
    #[serde(rename = "requestorID")]
    #[validate(range(min = 1))]
    pub requestor_id: i64,
    #[serde(rename = "objectIDs", default)]
    pub object_ids: Vec<i64>,
    #[serde(rename = "secretKey", default)]
    pub secret_key: String,
}

impl From<BatchDeletionBody> for BatchDeletionRequest {
    fn from(body: BatchDeletionBody) -> Self {
        Self {
            institution_id: body.institution_id,
            requestor_id: body.requestor_id,
            object_ids: body.object_ids,
            secret_key: body.secret_key,
        }
    }
}

#[utoipa::path(
    post,
    path = "/admin/deletions/batch",
    tag = "admin",
    request_body = BatchDeletionBody,
    responses(
        (status = 201, description = "One deletion request covering every object", body = DeletionRequest),
        (status = 400, description = "Malformed body or empty object list", body = ErrorResponse),
        (status = 403, description = "Bad secret key or requestor not allowed", body = ErrorResponse),
        (status = 409, description = "One or more objects cannot be deleted", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, body), fields(user_id = user.0.id))]
pub async fn batch_delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(body): ValidatedJson<BatchDeletionBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_sys_admin(&user.0, "submit batch deletions")?;
    let request = state.batch.request_deletion(&body.into()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/admin/files/{id}/prepare_delete",
    tag = "admin",
    params(("id" = i64, Path, description = "Generic file ID")),
    responses(
        (status = 200, description = "Confirmed deletion with a started work item", body = DeletionRequest),
        (status = 400, description = "Not available outside the test environment", body = ErrorResponse),
        (status = 403, description = "System administrators only", body = ErrorResponse)
    )
)]
pub async fn prepare_file_delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_sys_admin(&user.0, "prepare deletions")?;
    let request = state.deletion.prepare_file_delete(id).await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/admin/objects/{id}/prepare_delete",
    tag = "admin",
    params(("id" = i64, Path, description = "Intellectual object ID")),
    responses(
        (status = 200, description = "Confirmed deletion with a started work item", body = DeletionRequest),
        (status = 400, description = "Not available outside the test environment", body = ErrorResponse),
        (status = 403, description = "System administrators only", body = ErrorResponse)
    )
)]
pub async fn prepare_object_delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_sys_admin(&user.0, "prepare deletions")?;
    let request = state.deletion.prepare_object_delete(id).await?;
    Ok(Json(request))
}
