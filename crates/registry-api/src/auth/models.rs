use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use registry_core::models::User;
use registry_core::AppError;

use crate::error::HttpAppError;

/// The authenticated user, inserted by [`super::auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Not signed in".to_string())))
    }
}
