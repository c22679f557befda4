use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Answer, Attempt};
use crate::db::types::AttemptStatus;

const COLUMNS: &str = "id, quiz_id, user_id, participant_name, participant_info, status, \
     score, total_points, started_at, submitted_at";

const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, answer_text, is_correct, \
     points_earned, ai_feedback, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE quiz_id = $1 ORDER BY started_at DESC"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn has_submitted_attempt(
    pool: &PgPool,
    quiz_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, String>(
        "SELECT id FROM attempts WHERE quiz_id = $1 AND user_id = $2 AND status = $3 LIMIT 1",
    )
    .bind(quiz_id)
    .bind(user_id)
    .bind(AttemptStatus::Submitted)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub quiz_id: &'a str,
    pub user_id: Option<&'a str>,
    pub participant_name: Option<&'a str>,
    pub participant_info: Option<serde_json::Value>,
    pub started_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAttempt<'_>,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (id, quiz_id, user_id, participant_name, participant_info, \
             status, started_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.user_id)
    .bind(params.participant_name)
    .bind(params.participant_info.map(Json))
    .bind(AttemptStatus::InProgress)
    .bind(params.started_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateAttemptMeta {
    pub participant_name: Option<String>,
    pub participant_info: Option<serde_json::Value>,
}

pub(crate) async fn update_meta(
    pool: &PgPool,
    id: &str,
    params: UpdateAttemptMeta,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attempts SET
            participant_name = COALESCE($1, participant_name),
            participant_info = COALESCE($2, participant_info)
         WHERE id = $3",
    )
    .bind(params.participant_name)
    .bind(params.participant_info.map(Json))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Stable scoring order: answer creation order, id as tie-breaker.
pub(crate) async fn list_answers(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE attempt_id = $1 ORDER BY created_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}

/// One answer per (attempt, question): re-saving overwrites the text and
/// clears any scoring fields left over from a previous save.
pub(crate) async fn upsert_answer(
    pool: &PgPool,
    id: &str,
    attempt_id: &str,
    question_id: &str,
    answer_text: &str,
    created_at: PrimitiveDateTime,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (id, attempt_id, question_id, answer_text, points_earned, created_at)
         VALUES ($1,$2,$3,$4,0,$5)
         ON CONFLICT (attempt_id, question_id) DO UPDATE
         SET answer_text = EXCLUDED.answer_text,
             is_correct = NULL,
             points_earned = 0,
             ai_feedback = NULL
         RETURNING {ANSWER_COLUMNS}",
    ))
    .bind(id)
    .bind(attempt_id)
    .bind(question_id)
    .bind(answer_text)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct AnswerScore {
    pub answer_id: String,
    pub is_correct: Option<bool>,
    pub points_earned: f64,
    pub ai_feedback: Option<String>,
}

/// Persists the scored answers and flips the attempt to submitted as one
/// transaction. The attempt update is a compare-and-swap on status, so a
/// concurrent submit loses cleanly: zero rows affected rolls everything
/// back and the caller reports the attempt as already submitted.
pub(crate) async fn finalize_submission(
    pool: &PgPool,
    attempt_id: &str,
    scores: &[AnswerScore],
    score: f64,
    total_points: f64,
    submitted_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for entry in scores {
        sqlx::query(
            "UPDATE answers SET is_correct = $1, points_earned = $2, \
                 ai_feedback = COALESCE($3, ai_feedback)
             WHERE id = $4 AND attempt_id = $5",
        )
        .bind(entry.is_correct)
        .bind(entry.points_earned)
        .bind(entry.ai_feedback.as_deref())
        .bind(&entry.answer_id)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;
    }

    let result = sqlx::query(
        "UPDATE attempts SET status = $1, score = $2, total_points = $3, submitted_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(AttemptStatus::Submitted)
    .bind(score)
    .bind(total_points)
    .bind(submitted_at)
    .bind(attempt_id)
    .bind(AttemptStatus::InProgress)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}
