use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use registry_core::models::{DeletionRequest, WorkItem};

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/objects/{id}/delete",
    tag = "intellectual_objects",
    params(("id" = i64, Path, description = "Intellectual object ID")),
    responses(
        (status = 201, description = "Deletion request opened; admins notified", body = DeletionRequest),
        (status = 403, description = "Not an admin of the owning institution", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse),
        (status = 409, description = "Object already deleted or has pending work", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user_id = user.0.id, intellectual_object_id = id))]
pub async fn request_object_deletion(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = state.deletion.request_for_object(id, &user.0).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/objects/{id}/restore",
    tag = "intellectual_objects",
    params(("id" = i64, Path, description = "Intellectual object ID")),
    responses(
        (status = 201, description = "Restoration queued", body = WorkItem),
        (status = 403, description = "Not a member of the owning institution", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse),
        (status = 409, description = "Object deleted or has pending work", body = ErrorResponse),
        (status = 502, description = "Work item saved but not queued", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user_id = user.0.id, intellectual_object_id = id))]
pub async fn request_object_restoration(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let item = state.restoration.restore_object(id, &user.0).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
