use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::schemas::user::UserResponse;
use crate::schemas::Envelope;

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<AuthResponse>>), ApiError> {
    validate(&payload)?;

    let email = payload.email.trim().to_lowercase();
    if repositories::users::exists_by_email(state.db(), &email).await? {
        return Err(ApiError::BadRequest("Email already registered".to_string()));
    }

    let hashed_password =
        security::hash_password(&payload.password).map_err(ApiError::internal)?;

    let now = primitive_now_utc();
    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password: &hashed_password,
            full_name: payload.full_name.trim(),
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    let token =
        security::create_access_token(&user.id, state.settings(), None).map_err(ApiError::internal)?;

    tracing::info!(user_id = %user.id, "User registered");
    metrics::counter!("quizforge_users_registered_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Envelope::success(
            "User registered successfully",
            AuthResponse::bearer(token, UserResponse::from_db(&user)),
        ),
    ))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<AuthResponse>>, ApiError> {
    validate(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let user = repositories::users::find_by_email(state.db(), &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect email or password".to_string()))?;

    let password_ok = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(ApiError::internal)?;
    if !password_ok {
        return Err(ApiError::Unauthorized("Incorrect email or password".to_string()));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token =
        security::create_access_token(&user.id, state.settings(), None).map_err(ApiError::internal)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Envelope::success(
        "Login successful",
        AuthResponse::bearer(token, UserResponse::from_db(&user)),
    ))
}

pub(crate) async fn me(CurrentUser(user): CurrentUser) -> Json<Envelope<UserResponse>> {
    Envelope::success("Current user", UserResponse::from_db(&user))
}
