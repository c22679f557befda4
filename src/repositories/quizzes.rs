use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Quiz, QuizSettings};

const COLUMNS: &str = "id, creator_id, title, description, is_survey, requires_login, \
     share_code, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "quiz_id, allow_ai_evaluation, time_limit_minutes, \
     show_results_immediately, allow_retake, custom_fields";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_share_code(
    pool: &PgPool,
    share_code: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE share_code = $1"))
        .bind(share_code)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn share_code_exists(
    pool: &PgPool,
    share_code: &str,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, String>("SELECT id FROM quizzes WHERE share_code = $1")
        .bind(share_code)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn list_by_creator(
    pool: &PgPool,
    creator_id: &str,
) -> Result<Vec<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes WHERE creator_id = $1 ORDER BY created_at DESC"
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateQuiz<'a> {
    pub id: &'a str,
    pub creator_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub is_survey: bool,
    pub requires_login: bool,
    pub share_code: &'a str,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) struct SettingsValues {
    pub allow_ai_evaluation: bool,
    pub time_limit_minutes: Option<i32>,
    pub show_results_immediately: bool,
    pub allow_retake: bool,
    pub custom_fields: serde_json::Value,
}

/// Inserts the quiz row and its settings row as one unit.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuiz<'_>,
    settings: SettingsValues,
) -> Result<Quiz, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (id, creator_id, title, description, is_survey, requires_login, \
             share_code, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.creator_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.is_survey)
    .bind(params.requires_login)
    .bind(params.share_code)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO quiz_settings (quiz_id, allow_ai_evaluation, time_limit_minutes, \
             show_results_immediately, allow_retake, custom_fields)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(&quiz.id)
    .bind(settings.allow_ai_evaluation)
    .bind(settings.time_limit_minutes)
    .bind(settings.show_results_immediately)
    .bind(settings.allow_retake)
    .bind(Json(settings.custom_fields))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(quiz)
}

pub(crate) struct UpdateQuiz {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_survey: Option<bool>,
    pub requires_login: Option<bool>,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(pool: &PgPool, id: &str, params: UpdateQuiz) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            is_survey = COALESCE($3, is_survey),
            requires_login = COALESCE($4, requires_login),
            updated_at = $5
         WHERE id = $6",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.is_survey)
    .bind(params.requires_login)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) struct UpdateSettings {
    pub allow_ai_evaluation: Option<bool>,
    pub time_limit_minutes: Option<Option<i32>>,
    pub show_results_immediately: Option<bool>,
    pub allow_retake: Option<bool>,
    pub custom_fields: Option<serde_json::Value>,
}

pub(crate) async fn update_settings(
    pool: &PgPool,
    quiz_id: &str,
    params: UpdateSettings,
) -> Result<(), sqlx::Error> {
    // time_limit_minutes is nullable, so "not provided" and "set to null"
    // are carried as separate flags.
    let (set_time_limit, time_limit) = match params.time_limit_minutes {
        Some(value) => (true, value),
        None => (false, None),
    };

    sqlx::query(
        "UPDATE quiz_settings SET
            allow_ai_evaluation = COALESCE($1, allow_ai_evaluation),
            time_limit_minutes = CASE WHEN $2 THEN $3 ELSE time_limit_minutes END,
            show_results_immediately = COALESCE($4, show_results_immediately),
            allow_retake = COALESCE($5, allow_retake),
            custom_fields = COALESCE($6, custom_fields)
         WHERE quiz_id = $7",
    )
    .bind(params.allow_ai_evaluation)
    .bind(set_time_limit)
    .bind(time_limit)
    .bind(params.show_results_immediately)
    .bind(params.allow_retake)
    .bind(params.custom_fields.map(Json))
    .bind(quiz_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn find_settings(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Option<QuizSettings>, sqlx::Error> {
    sqlx::query_as::<_, QuizSettings>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM quiz_settings WHERE quiz_id = $1"
    ))
    .bind(quiz_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM quizzes WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
