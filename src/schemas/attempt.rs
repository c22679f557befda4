use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Answer, Attempt};
use crate::db::types::AttemptStatus;

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct AttemptStart {
    #[validate(length(max = 100, message = "Participant name must be at most 100 characters"))]
    pub(crate) participant_name: Option<String>,
    pub(crate) participant_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptUpdate {
    #[validate(length(max = 100, message = "Participant name must be at most 100 characters"))]
    pub(crate) participant_name: Option<String>,
    pub(crate) participant_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSave {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[validate(length(min = 1, message = "answer_text must not be empty"))]
    pub(crate) answer_text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) answer_text: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) ai_feedback: Option<String>,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: &Answer) -> Self {
        Self {
            id: answer.id.clone(),
            question_id: answer.question_id.clone(),
            answer_text: answer.answer_text.clone(),
            is_correct: answer.is_correct,
            points_earned: answer.points_earned,
            ai_feedback: answer.ai_feedback.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) user_id: Option<String>,
    pub(crate) participant_name: Option<String>,
    pub(crate) participant_info: Option<serde_json::Value>,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<f64>,
    pub(crate) total_points: Option<f64>,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) answers: Option<Vec<AnswerResponse>>,
}

impl AttemptResponse {
    pub(crate) fn from_db(attempt: &Attempt, answers: Option<&[Answer]>) -> Self {
        Self {
            id: attempt.id.clone(),
            quiz_id: attempt.quiz_id.clone(),
            user_id: attempt.user_id.clone(),
            participant_name: attempt.participant_name.clone(),
            participant_info: attempt.participant_info.as_ref().map(|info| info.0.clone()),
            status: attempt.status,
            score: attempt.score,
            total_points: attempt.total_points,
            started_at: format_primitive(attempt.started_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            answers: answers.map(|items| items.iter().map(AnswerResponse::from_db).collect()),
        }
    }
}
