use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use registry_core::AppError;

use crate::auth::jwt::validate_token;
use crate::auth::models::CurrentUser;
use crate::error::HttpAppError;
use crate::state::AppState;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token.to_string(),
        None => {
            tracing::debug!("Missing or malformed authorization header");
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    match authenticate(&state, &token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<registry_core::models::User, AppError> {
    let claims = validate_token(state.config.jwt_secret(), token)?;
    let user = state
        .ctx
        .catalog
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;
    if !user.is_active() {
        tracing::warn!(user_id = user.id, "Deactivated user presented a valid token");
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }
    Ok(user)
}
