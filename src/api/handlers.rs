use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::errors::ApiError;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{Envelope, HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<Envelope<RootResponse>> {
    let api = state.settings().api();
    Envelope::success(
        format!("Welcome to {}", api.project_name),
        RootResponse {
            name: api.project_name.clone(),
            version: api.version.clone(),
            docs: format!("{}/docs", api.api_v1_str),
        },
    )
}

pub(crate) async fn healthz(
    State(state): State<AppState>,
) -> Result<Json<Envelope<HealthResponse>>, ApiError> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(state.db()).await.is_ok();

    if !database {
        return Err(ApiError::internal("database health check failed"));
    }

    Ok(Envelope::success("Service healthy", HealthResponse { database }))
}

pub(crate) async fn metrics() -> impl IntoResponse {
    match metrics::render() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
