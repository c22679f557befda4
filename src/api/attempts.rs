use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::MaybeUser;
use crate::api::validation::validate;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Attempt, User};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{AnswerSave, AttemptResponse, AttemptStart, AttemptUpdate};
use crate::schemas::Envelope;
use crate::services::scoring::{self, SubmitError};

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::NotFound => ApiError::NotFound("Attempt not found".to_string()),
            SubmitError::AlreadySubmitted => {
                ApiError::BadRequest("Attempt has already been submitted".to_string())
            }
            SubmitError::Db(db) => ApiError::internal(db),
        }
    }
}

/// Logged-in attempts belong to their user; anonymous attempts are
/// addressable only through their id.
fn check_attempt_access(attempt: &Attempt, user: Option<&User>) -> Result<(), ApiError> {
    if let Some(owner_id) = &attempt.user_id {
        let allowed = user.map(|user| &user.id == owner_id).unwrap_or(false);
        if !allowed {
            return Err(ApiError::Forbidden("Not your attempt".to_string()));
        }
    }
    Ok(())
}

pub(crate) async fn start(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(quiz_id): Path<String>,
    Json(payload): Json<AttemptStart>,
) -> Result<(StatusCode, Json<Envelope<AttemptResponse>>), ApiError> {
    validate(&payload)?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    if quiz.requires_login && user.is_none() {
        return Err(ApiError::BadRequest("This quiz requires login".to_string()));
    }

    if let Some(user) = &user {
        let allow_retake = repositories::quizzes::find_settings(state.db(), &quiz.id)
            .await?
            .map(|settings| settings.allow_retake)
            .unwrap_or(false);
        if !allow_retake
            && repositories::attempts::has_submitted_attempt(state.db(), &quiz.id, &user.id).await?
        {
            return Err(ApiError::Forbidden("Retakes are not allowed for this quiz".to_string()));
        }
    }

    let attempt = repositories::attempts::create(
        state.db(),
        repositories::attempts::CreateAttempt {
            id: &Uuid::new_v4().to_string(),
            quiz_id: &quiz.id,
            user_id: user.as_ref().map(|user| user.id.as_str()),
            participant_name: payload.participant_name.as_deref(),
            participant_info: payload.participant_info,
            started_at: primitive_now_utc(),
        },
    )
    .await?;

    tracing::info!(attempt_id = %attempt.id, quiz_id = %quiz.id, "Attempt started");
    metrics::counter!("quizforge_attempts_started_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Envelope::success("Attempt started", AttemptResponse::from_db(&attempt, None)),
    ))
}

pub(crate) async fn update_meta(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<AttemptUpdate>,
) -> Result<Json<Envelope<AttemptResponse>>, ApiError> {
    validate(&payload)?;

    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;
    check_attempt_access(&attempt, user.as_ref())?;

    if attempt.status == AttemptStatus::Submitted {
        return Err(ApiError::BadRequest("Attempt has already been submitted".to_string()));
    }

    repositories::attempts::update_meta(
        state.db(),
        &attempt.id,
        repositories::attempts::UpdateAttemptMeta {
            participant_name: payload.participant_name,
            participant_info: payload.participant_info,
        },
    )
    .await?;

    let attempt = repositories::attempts::find_by_id(state.db(), &attempt.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    Ok(Envelope::success("Attempt updated", AttemptResponse::from_db(&attempt, None)))
}

pub(crate) async fn save_answer(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<AnswerSave>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    validate(&payload)?;

    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;
    check_attempt_access(&attempt, user.as_ref())?;

    if attempt.status == AttemptStatus::Submitted {
        return Err(ApiError::BadRequest("Attempt has already been submitted".to_string()));
    }

    let question = repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;
    if question.quiz_id != attempt.quiz_id {
        return Err(ApiError::BadRequest("Question does not belong to this quiz".to_string()));
    }

    let answer = repositories::attempts::upsert_answer(
        state.db(),
        &Uuid::new_v4().to_string(),
        &attempt.id,
        &question.id,
        &payload.answer_text,
        primitive_now_utc(),
    )
    .await?;

    Ok(Envelope::success(
        "Answer saved",
        serde_json::json!({ "id": answer.id, "question_id": answer.question_id }),
    ))
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(attempt_id): Path<String>,
) -> Result<Json<Envelope<AttemptResponse>>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;
    check_attempt_access(&attempt, user.as_ref())?;

    let (attempt, answers) = scoring::submit_attempt(&state, &attempt_id).await?;

    metrics::counter!("quizforge_attempts_submitted_total").increment(1);

    let show_results = repositories::quizzes::find_settings(state.db(), &attempt.quiz_id)
        .await?
        .map(|settings| settings.show_results_immediately)
        .unwrap_or(true);

    let response = if show_results {
        AttemptResponse::from_db(&attempt, Some(&answers))
    } else {
        hide_results(&attempt)
    };

    Ok(Envelope::success("Attempt submitted successfully", response))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(attempt_id): Path<String>,
) -> Result<Json<Envelope<AttemptResponse>>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &attempt.quiz_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;
    let is_creator = user.as_ref().map(|user| user.id == quiz.creator_id).unwrap_or(false);

    if !is_creator {
        check_attempt_access(&attempt, user.as_ref())?;
    }

    let show_results = is_creator
        || repositories::quizzes::find_settings(state.db(), &attempt.quiz_id)
            .await?
            .map(|settings| settings.show_results_immediately)
            .unwrap_or(true);

    let response = if show_results {
        let answers = repositories::attempts::list_answers(state.db(), &attempt.id).await?;
        AttemptResponse::from_db(&attempt, Some(&answers))
    } else {
        hide_results(&attempt)
    };

    Ok(Envelope::success("Attempt retrieved", response))
}

fn hide_results(attempt: &Attempt) -> AttemptResponse {
    let mut response = AttemptResponse::from_db(attempt, None);
    response.score = None;
    response.total_points = None;
    response
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::core::time::primitive_now_utc;
    use crate::db::types::{McqKey, QuestionContent};
    use crate::repositories;
    use crate::test_support::{self, TestContext};

    struct SubmitFixture {
        attempt_id: String,
    }

    /// One MCQ worth 2 and one fill-blank worth 4; the saved answers earn
    /// 2 + 2 of the 6 available points.
    async fn start_and_answer(ctx: &TestContext) -> SubmitFixture {
        let pool = ctx.state.db();
        let creator = test_support::insert_user(pool, "creator@example.com", "password-123").await;
        let quiz = test_support::insert_quiz(pool, &creator.id, "Capitals").await;

        let mcq = test_support::insert_question(
            pool,
            &quiz.id,
            "Pick the second option",
            QuestionContent::Mcq {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: McqKey::Single(1),
            },
            2,
            0,
        )
        .await;
        let blank = test_support::insert_question(
            pool,
            &quiz.id,
            "Fill both blanks",
            QuestionContent::FillBlank { expected: vec!["a".into(), "b".into()] },
            4,
            1,
        )
        .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/quizzes/{}/attempts", quiz.id),
                None,
                Some(json!({})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = test_support::read_json(response).await;
        let attempt_id = body["data"]["id"].as_str().expect("attempt id").to_string();

        for (question_id, answer_text) in [(&mcq.id, "1"), (&blank.id, "a|x")] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    &format!("/api/v1/attempts/{attempt_id}/answers"),
                    None,
                    Some(json!({"question_id": question_id, "answer_text": answer_text})),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        SubmitFixture { attempt_id }
    }

    async fn submit(ctx: &TestContext, attempt_id: &str) -> axum::response::Response {
        ctx.app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/attempts/{attempt_id}/submit"),
                None,
                None,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn submit_scores_all_answers_and_closes_the_attempt() {
        let Some(ctx) = test_support::try_setup_test_context().await else { return };
        let fixture = start_and_answer(&ctx).await;

        let response = submit(&ctx, &fixture.attempt_id).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], "SUCCESS");
        assert_eq!(body["data"]["status"], "SUBMITTED");
        assert_eq!(body["data"]["score"], 4.0);
        assert_eq!(body["data"]["total_points"], 6.0);

        let answers = body["data"]["answers"].as_array().expect("answers");
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().any(|answer| answer["points_earned"] == 2.0
            && answer["is_correct"] == true));
        assert!(answers.iter().any(|answer| answer["points_earned"] == 2.0
            && answer["is_correct"] == false));
    }

    #[tokio::test]
    async fn second_submit_is_rejected_and_leaves_the_score_alone() {
        let Some(ctx) = test_support::try_setup_test_context().await else { return };
        let fixture = start_and_answer(&ctx).await;

        let first = submit(&ctx, &fixture.attempt_id).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = submit(&ctx, &fixture.attempt_id).await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body = test_support::read_json(second).await;
        assert_eq!(body["status"], "FAIL");
        assert_eq!(body["message"], "Attempt has already been submitted");

        let attempt = repositories::attempts::find_by_id(ctx.state.db(), &fixture.attempt_id)
            .await
            .unwrap()
            .expect("attempt");
        assert_eq!(attempt.score, Some(4.0));
        assert_eq!(attempt.total_points, Some(6.0));
    }

    #[tokio::test]
    async fn finalize_is_a_no_op_once_the_attempt_left_in_progress() {
        let Some(ctx) = test_support::try_setup_test_context().await else { return };
        let fixture = start_and_answer(&ctx).await;

        let first = submit(&ctx, &fixture.attempt_id).await;
        assert_eq!(first.status(), StatusCode::OK);

        // A finalize that lost the status race rolls back without touching
        // the recorded totals.
        let updated = repositories::attempts::finalize_submission(
            ctx.state.db(),
            &fixture.attempt_id,
            &[],
            0.0,
            0.0,
            primitive_now_utc(),
        )
        .await
        .unwrap();
        assert!(!updated);

        let attempt = repositories::attempts::find_by_id(ctx.state.db(), &fixture.attempt_id)
            .await
            .unwrap()
            .expect("attempt");
        assert_eq!(attempt.score, Some(4.0));
        assert_eq!(attempt.total_points, Some(6.0));
    }
}
