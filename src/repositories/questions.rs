use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::db::types::QuestionContent;

const COLUMNS: &str = "id, quiz_id, kind, prompt, content, points, position, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY position, created_at"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn max_position(pool: &PgPool, quiz_id: &str) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(position), -1) FROM questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await
}

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub quiz_id: &'a str,
    pub prompt: &'a str,
    pub content: QuestionContent,
    pub points: i32,
    pub position: i32,
    pub created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    let kind = params.content.kind();
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, quiz_id, kind, prompt, content, points, position, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(kind)
    .bind(params.prompt)
    .bind(Json(params.content))
    .bind(params.points)
    .bind(params.position)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateQuestion {
    pub prompt: Option<String>,
    pub content: Option<QuestionContent>,
    pub points: Option<i32>,
    pub position: Option<i32>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateQuestion,
) -> Result<Question, sqlx::Error> {
    let kind = params.content.as_ref().map(|content| content.kind());
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            prompt = COALESCE($1, prompt),
            kind = COALESCE($2, kind),
            content = COALESCE($3, content),
            points = COALESCE($4, points),
            position = COALESCE($5, position)
         WHERE id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.prompt)
    .bind(kind)
    .bind(params.content.map(Json))
    .bind(params.points)
    .bind(params.position)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

/// Applies a position per question id, scoped to one quiz. Ids that do not
/// belong to the quiz are ignored; returns the number of rows updated.
pub(crate) async fn reorder(
    pool: &PgPool,
    quiz_id: &str,
    positions: &HashMap<String, i32>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (question_id, position) in positions {
        let result =
            sqlx::query("UPDATE questions SET position = $1 WHERE id = $2 AND quiz_id = $3")
                .bind(position)
                .bind(question_id)
                .bind(quiz_id)
                .execute(&mut *tx)
                .await?;
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}
