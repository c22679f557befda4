use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, QuestionContent, QuestionKind};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: String,
    pub(crate) creator_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) is_survey: bool,
    pub(crate) requires_login: bool,
    pub(crate) share_code: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizSettings {
    pub(crate) quiz_id: String,
    pub(crate) allow_ai_evaluation: bool,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_retake: bool,
    pub(crate) custom_fields: Json<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) content: Json<QuestionContent>,
    pub(crate) points: i32,
    pub(crate) position: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) user_id: Option<String>,
    pub(crate) participant_name: Option<String>,
    pub(crate) participant_info: Option<Json<serde_json::Value>>,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<f64>,
    pub(crate) total_points: Option<f64>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answer_text: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) ai_feedback: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
