//! Review, approval and cancellation of deletion requests.
//!
//! The review link sent to institutional admins carries the confirmation
//! token in its query string. Approve and cancel post the same token back in
//! a form body; the request is only touched if the token verifies.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use registry_core::models::{DeletionRequest, WorkItem};
use registry_services::deletion::DeletionDetails;
use registry_services::permissions::ensure_can_review_deletion;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedForm};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewQuery {
    /// Confirmation token from the review link
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TokenForm {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletionDetailsResponse {
    pub request: DeletionRequest,
    pub work_items: Vec<WorkItem>,
}

impl From<DeletionDetails> for DeletionDetailsResponse {
    fn from(details: DeletionDetails) -> Self {
        Self {
            request: details.request,
            work_items: details.work_items,
        }
    }
}

#[utoipa::path(
    get,
    path = "/deletions/review/{id}",
    tag = "deletions",
    params(("id" = i64, Path, description = "Deletion request ID"), ReviewQuery),
    responses(
        (status = 200, description = "Request awaiting a decision", body = DeletionDetailsResponse),
        (status = 403, description = "Bad token or not an admin of the institution", body = ErrorResponse),
        (status = 404, description = "Deletion request not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, query), fields(user_id = user.0.id, deletion_request_id = id))]
pub async fn review(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = state.deletion.load_for_review(id, &query.token).await?;
    ensure_can_review_deletion(&user.0, request.institution_id)?;
    let details = state.deletion.details(id, &user.0).await?;
    Ok(Json(DeletionDetailsResponse::from(details)))
}

#[utoipa::path(
    post,
    path = "/deletions/approve/{id}",
    tag = "deletions",
    params(("id" = i64, Path, description = "Deletion request ID")),
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Approved; delete work items queued", body = DeletionRequest),
        (status = 403, description = "Bad token or not an admin of the institution", body = ErrorResponse),
        (status = 409, description = "Already approved or cancelled", body = ErrorResponse),
        (status = 502, description = "Approved but not queued; run the stranded deletion job", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, form), fields(user_id = user.0.id, deletion_request_id = id))]
pub async fn approve(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    ValidatedForm(form): ValidatedForm<TokenForm>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = state.deletion.load_for_review(id, &form.token).await?;
    let confirmed = state.deletion.confirm(&request, &user.0).await?;
    Ok(Json(confirmed))
}

#[utoipa::path(
    post,
    path = "/deletions/cancel/{id}",
    tag = "deletions",
    params(("id" = i64, Path, description = "Deletion request ID")),
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Cancelled; nothing was queued", body = DeletionRequest),
        (status = 403, description = "Bad token or not an admin of the institution", body = ErrorResponse),
        (status = 409, description = "Already approved or cancelled", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, form), fields(user_id = user.0.id, deletion_request_id = id))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    ValidatedForm(form): ValidatedForm<TokenForm>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = state.deletion.load_for_review(id, &form.token).await?;
    let cancelled = state.deletion.cancel(&request, &user.0).await?;
    Ok(Json(cancelled))
}

/// Read-only view; no token needed.
#[utoipa::path(
    get,
    path = "/deletions/show/{id}",
    tag = "deletions",
    params(("id" = i64, Path, description = "Deletion request ID")),
    responses(
        (status = 200, description = "Request and its work items", body = DeletionDetailsResponse),
        (status = 403, description = "Not a member of the institution", body = ErrorResponse),
        (status = 404, description = "Deletion request not found", body = ErrorResponse)
    )
)]
pub async fn show(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let details = state.deletion.details(id, &user.0).await?;
    Ok(Json(DeletionDetailsResponse::from(details)))
}
