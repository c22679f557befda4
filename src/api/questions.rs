use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Quiz;
use crate::repositories;
use crate::schemas::question::{
    GenerateRequest, QuestionCreate, QuestionResponse, QuestionUpdate, ReorderRequest,
};
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
    Path(quiz_id): Path<String>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<Envelope<QuestionResponse>>), ApiError> {
    validate(&payload)?;
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;

    let content = payload.build_content().map_err(ApiError::BadRequest)?;
    let position = repositories::questions::max_position(state.db(), &quiz.id).await? + 1;

    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            quiz_id: &quiz.id,
            prompt: payload.prompt.trim(),
            content,
            points: payload.points,
            position,
            created_at: primitive_now_utc(),
        },
    )
    .await?;

    tracing::info!(question_id = %question.id, quiz_id = %quiz.id, "Question created");

    Ok((
        StatusCode::CREATED,
        Envelope::success(
            "Question created successfully",
            QuestionResponse::from_db(&question, true),
        ),
    ))
}

pub(crate) async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<Envelope<Vec<QuestionResponse>>>, ApiError> {
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id).await?;
    let responses = questions
        .iter()
        .map(|question| QuestionResponse::from_db(question, true))
        .collect::<Vec<_>>();
    Ok(Envelope::success("Questions retrieved", responses))
}

/// Generates questions from a topic with the configured model and
/// appends the validated drafts to the quiz.
pub(crate) async fn generate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Envelope<Vec<QuestionResponse>>>), ApiError> {
    validate(&payload)?;
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;

    let Some(ai) = state.ai() else {
        return Err(ApiError::BadRequest("AI question generation is not configured".to_string()));
    };

    let drafts = ai
        .generate_questions(payload.topic.trim(), payload.kind, payload.count)
        .await
        .map_err(ApiError::internal)?;

    let mut position = repositories::questions::max_position(state.db(), &quiz.id).await? + 1;
    let mut created = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let question = repositories::questions::create(
            state.db(),
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                quiz_id: &quiz.id,
                prompt: &draft.prompt,
                content: draft.content,
                points: draft.points,
                position,
                created_at: primitive_now_utc(),
            },
        )
        .await?;
        position += 1;
        created.push(question);
    }

    tracing::info!(quiz_id = %quiz.id, count = created.len(), "Questions generated");
    metrics::counter!("quizforge_questions_generated_total").increment(created.len() as u64);

    let responses = created
        .iter()
        .map(|question| QuestionResponse::from_db(question, true))
        .collect::<Vec<_>>();

    Ok((StatusCode::CREATED, Envelope::success("Questions generated successfully", responses)))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<Envelope<QuestionResponse>>, ApiError> {
    validate(&payload)?;

    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
    owned_quiz(&state, &question.quiz_id, &user.id).await?;

    let content = payload.build_content(&question.content.0).map_err(ApiError::BadRequest)?;

    let question = repositories::questions::update(
        state.db(),
        &question.id,
        repositories::questions::UpdateQuestion {
            prompt: payload.prompt.map(|prompt| prompt.trim().to_string()),
            content,
            points: payload.points,
            position: payload.position,
        },
    )
    .await?;

    Ok(Envelope::success(
        "Question updated successfully",
        QuestionResponse::from_db(&question, true),
    ))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
    owned_quiz(&state, &question.quiz_id, &user.id).await?;

    repositories::questions::delete(state.db(), &question.id).await?;

    Ok(Envelope::success("Question deleted successfully", serde_json::Value::Null))
}

/// Every referenced question is resolved up front; a batch that mixes
/// quizzes is rejected before any ownership check so the outcome does not
/// depend on map iteration order.
pub(crate) async fn reorder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    if payload.positions.is_empty() {
        return Err(ApiError::BadRequest("positions must not be empty".to_string()));
    }

    let mut quiz_id: Option<String> = None;
    for question_id in payload.positions.keys() {
        let question = repositories::questions::find_by_id(state.db(), question_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
        match &quiz_id {
            Some(existing) if *existing != question.quiz_id => {
                return Err(ApiError::BadRequest(
                    "All questions must belong to the same quiz".to_string(),
                ));
            }
            Some(_) => {}
            None => quiz_id = Some(question.quiz_id),
        }
    }

    let Some(quiz_id) = quiz_id else {
        return Err(ApiError::BadRequest("positions must not be empty".to_string()));
    };
    let quiz = owned_quiz(&state, &quiz_id, &user.id).await?;

    let updated =
        repositories::questions::reorder(state.db(), &quiz.id, &payload.positions).await?;

    Ok(Envelope::success(
        "Questions reordered successfully",
        serde_json::json!({ "updated": updated }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::QuestionContent;
    use crate::repositories;
    use crate::test_support;

    #[tokio::test]
    async fn reorder_rejects_questions_from_different_quizzes() {
        let Some(ctx) = test_support::try_setup_test_context().await else { return };
        let pool = ctx.state.db();

        let creator = test_support::insert_user(pool, "creator@example.com", "password-123").await;
        let first_quiz = test_support::insert_quiz(pool, &creator.id, "First").await;
        let second_quiz = test_support::insert_quiz(pool, &creator.id, "Second").await;

        let in_first = test_support::insert_question(
            pool,
            &first_quiz.id,
            "Q1",
            QuestionContent::TrueFalse { correct: true },
            1,
            0,
        )
        .await;
        let in_second = test_support::insert_question(
            pool,
            &second_quiz.id,
            "Q2",
            QuestionContent::TrueFalse { correct: false },
            1,
            0,
        )
        .await;

        let token = test_support::bearer_token(&creator.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/questions/reorder",
                Some(&token),
                Some(json!({"positions": {in_first.id.as_str(): 1, in_second.id.as_str(): 0}})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::read_json(response).await;
        assert_eq!(body["message"], "All questions must belong to the same quiz");
    }

    #[tokio::test]
    async fn reorder_applies_positions_within_one_quiz() {
        let Some(ctx) = test_support::try_setup_test_context().await else { return };
        let pool = ctx.state.db();

        let creator = test_support::insert_user(pool, "creator@example.com", "password-123").await;
        let quiz = test_support::insert_quiz(pool, &creator.id, "Ordering").await;

        let first = test_support::insert_question(
            pool,
            &quiz.id,
            "Q1",
            QuestionContent::TrueFalse { correct: true },
            1,
            0,
        )
        .await;
        let second = test_support::insert_question(
            pool,
            &quiz.id,
            "Q2",
            QuestionContent::TrueFalse { correct: false },
            1,
            1,
        )
        .await;

        let token = test_support::bearer_token(&creator.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/questions/reorder",
                Some(&token),
                Some(json!({"positions": {first.id.as_str(): 1, second.id.as_str(): 0}})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["updated"], 2);

        let ordered = repositories::questions::list_by_quiz(pool, &quiz.id).await.unwrap();
        assert_eq!(ordered[0].id, second.id);
        assert_eq!(ordered[1].id, first.id);
    }
}
