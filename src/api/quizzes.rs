use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentUser, MaybeUser};
use crate::api::validation::validate;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Quiz;
use crate::repositories;
use crate::schemas::attempt::AttemptResponse;
use crate::schemas::question::QuestionResponse;
use crate::schemas::quiz::{QuizCreate, QuizResponse, QuizSettingsPayload, QuizUpdate};
use crate::schemas::Envelope;

async fn owned_quiz(state: &AppState, quiz_id: &str, user_id: &str) -> Result<Quiz, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), quiz_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;
    if quiz.creator_id != user_id {
        return Err(ApiError::Forbidden("Not the quiz creator".to_string()));
    }
    Ok(quiz)
}

pub(crate) async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<QuizCreate>,
) -> Result<(StatusCode, Json<Envelope<QuizResponse>>), ApiError> {
    validate(&payload)?;

    let share_code = crate::services::share_codes::unique_share_code(state.db()).await?;
    let now = primitive_now_utc();
    let settings_payload = payload.settings.unwrap_or_default();

    let quiz = repositories::quizzes::create(
        state.db(),
        repositories::quizzes::CreateQuiz {
            id: &Uuid::new_v4().to_string(),
            creator_id: &user.id,
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            is_survey: payload.is_survey,
            requires_login: payload.requires_login,
            share_code: &share_code,
            created_at: now,
            updated_at: now,
        },
        repositories::quizzes::SettingsValues {
            allow_ai_evaluation: settings_payload.allow_ai_evaluation.unwrap_or(false),
            time_limit_minutes: settings_payload.time_limit_minutes.flatten(),
            show_results_immediately: settings_payload.show_results_immediately.unwrap_or(true),
            allow_retake: settings_payload.allow_retake.unwrap_or(false),
            custom_fields: settings_payload
                .custom_fields
                .unwrap_or_else(|| serde_json::json!({})),
        },
    )
    .await?;

    let settings = repositories::quizzes::find_settings(state.db(), &quiz.id).await?;

    tracing::info!(quiz_id = %quiz.id, creator_id = %user.id, "Quiz created");
    metrics::counter!("quizforge_quizzes_created_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Envelope::success(
            "Quiz created successfully",
            QuizResponse::from_db(&quiz, settings.as_ref()),
        ),
    ))
}

pub(crate) async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Envelope<Vec<QuizResponse>>>, ApiError> {
    let quizzes = repositories::quizzes::list_by_creator(state.db(), &user.id).await?;
    let responses =
        quizzes.iter().map(|quiz| QuizResponse::from_db(quiz, None)).collect::<Vec<_>>();
    Ok(Envelope::success("Quizzes retrieved", responses))
}

/// Answer keys appear only for the creator; everyone else gets the same
/// stripped view as the share-code route.
pub(crate) async fn get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;
    let is_creator = user.map(|user| user.id == quiz.creator_id).unwrap_or(false);

    let settings = repositories::quizzes::find_settings(state.db(), &quiz.id).await?;
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id).await?;

    let mut body = serde_json::to_value(QuizResponse::from_db(&quiz, settings.as_ref()))
        .map_err(ApiError::internal)?;
    body["questions"] = serde_json::to_value(
        questions
            .iter()
            .map(|question| QuestionResponse::from_db(question, is_creator))
            .collect::<Vec<_>>(),
    )
    .map_err(ApiError::internal)?;

    Ok(Envelope::success("Quiz retrieved", body))
}

/// Public entry point for participants. Answer keys are stripped from
/// every question in the payload.
pub(crate) async fn get_by_share_code(
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let share_code = share_code.trim().to_uppercase();
    let quiz = repositories::quizzes::find_by_share_code(state.db(), &share_code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    let settings = repositories::quizzes::find_settings(state.db(), &quiz.id).await?;
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id).await?;

    let mut body = serde_json::to_value(QuizResponse::from_db(&quiz, settings.as_ref()))
        .map_err(ApiError::internal)?;
    body["questions"] = serde_json::to_value(
        questions
            .iter()
            .map(|question| QuestionResponse::from_db(question, false))
            .collect::<Vec<_>>(),
    )
    .map_err(ApiError::internal)?;

    Ok(Envelope::success("Quiz retrieved", body))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
    Json(payload): Json<QuizUpdate>,
) -> Result<Json<Envelope<QuizResponse>>, ApiError> {
    validate(&payload)?;
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;

    repositories::quizzes::update(
        state.db(),
        &quiz.id,
        repositories::quizzes::UpdateQuiz {
            title: payload.title,
            description: payload.description,
            is_survey: payload.is_survey,
            requires_login: payload.requires_login,
            updated_at: primitive_now_utc(),
        },
    )
    .await?;

    if let Some(settings) = payload.settings {
        apply_settings_update(&state, &quiz.id, settings).await?;
    }

    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;
    let settings = repositories::quizzes::find_settings(state.db(), &quiz.id).await?;

    Ok(Envelope::success(
        "Quiz updated successfully",
        QuizResponse::from_db(&quiz, settings.as_ref()),
    ))
}

async fn apply_settings_update(
    state: &AppState,
    quiz_id: &str,
    payload: QuizSettingsPayload,
) -> Result<(), ApiError> {
    repositories::quizzes::update_settings(
        state.db(),
        quiz_id,
        repositories::quizzes::UpdateSettings {
            allow_ai_evaluation: payload.allow_ai_evaluation,
            time_limit_minutes: payload.time_limit_minutes,
            show_results_immediately: payload.show_results_immediately,
            allow_retake: payload.allow_retake,
            custom_fields: payload.custom_fields,
        },
    )
    .await?;
    Ok(())
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;
    repositories::quizzes::delete(state.db(), &quiz.id).await?;

    tracing::info!(quiz_id = %quiz.id, "Quiz deleted");

    Ok(Envelope::success("Quiz deleted successfully", serde_json::Value::Null))
}

pub(crate) async fn list_attempts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<Envelope<Vec<AttemptResponse>>>, ApiError> {
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;
    let attempts = repositories::attempts::list_by_quiz(state.db(), &quiz.id).await?;

    let mut responses = Vec::with_capacity(attempts.len());
    for attempt in &attempts {
        let answers = repositories::attempts::list_answers(state.db(), &attempt.id).await?;
        responses.push(AttemptResponse::from_db(attempt, Some(&answers)));
    }

    Ok(Envelope::success("Attempts retrieved", responses))
}
