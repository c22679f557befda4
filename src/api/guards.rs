use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;

/// Extractor for routes that require a logged-in, active user.
pub(crate) struct CurrentUser(pub(crate) User);

/// Extractor for routes open to anonymous participants. A missing or
/// invalid token resolves to `None` instead of rejecting the request.
pub(crate) struct MaybeUser(pub(crate) Option<User>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn user_from_token(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = security::verify_token(token, state.settings())
        .map_err(|_| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    let user = repositories::users::find_by_id(state.db(), &claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
        Ok(Self(user_from_token(state, token).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match bearer_token(parts) {
            Some(token) => Ok(Self(user_from_token(state, token).await.ok())),
            None => Ok(Self(None)),
        }
    }
}
