use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Quiz, QuizSettings};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuizSettingsPayload {
    #[serde(default)]
    pub(crate) allow_ai_evaluation: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) time_limit_minutes: Option<Option<i32>>,
    #[serde(default)]
    pub(crate) show_results_immediately: Option<bool>,
    #[serde(default)]
    pub(crate) allow_retake: Option<bool>,
    #[serde(default)]
    pub(crate) custom_fields: Option<serde_json::Value>,
}

/// Keeps "field absent" distinct from "field set to null" so a settings
/// update can clear the time limit.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) is_survey: bool,
    #[serde(default)]
    pub(crate) requires_login: bool,
    pub(crate) settings: Option<QuizSettingsPayload>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizUpdate {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_survey: Option<bool>,
    pub(crate) requires_login: Option<bool>,
    pub(crate) settings: Option<QuizSettingsPayload>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizSettingsResponse {
    pub(crate) allow_ai_evaluation: bool,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_retake: bool,
    pub(crate) custom_fields: serde_json::Value,
}

impl QuizSettingsResponse {
    pub(crate) fn from_db(settings: &QuizSettings) -> Self {
        Self {
            allow_ai_evaluation: settings.allow_ai_evaluation,
            time_limit_minutes: settings.time_limit_minutes,
            show_results_immediately: settings.show_results_immediately,
            allow_retake: settings.allow_retake,
            custom_fields: settings.custom_fields.0.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) creator_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) is_survey: bool,
    pub(crate) requires_login: bool,
    pub(crate) share_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) settings: Option<QuizSettingsResponse>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuizResponse {
    pub(crate) fn from_db(quiz: &Quiz, settings: Option<&QuizSettings>) -> Self {
        Self {
            id: quiz.id.clone(),
            creator_id: quiz.creator_id.clone(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            is_survey: quiz.is_survey,
            requires_login: quiz.requires_login,
            share_code: quiz.share_code.clone(),
            settings: settings.map(QuizSettingsResponse::from_db),
            created_at: format_primitive(quiz.created_at),
            updated_at: format_primitive(quiz.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_payload_distinguishes_null_from_absent() {
        let absent: QuizSettingsPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.time_limit_minutes, None);

        let cleared: QuizSettingsPayload =
            serde_json::from_str(r#"{"time_limit_minutes": null}"#).unwrap();
        assert_eq!(cleared.time_limit_minutes, Some(None));

        let set: QuizSettingsPayload =
            serde_json::from_str(r#"{"time_limit_minutes": 30}"#).unwrap();
        assert_eq!(set.time_limit_minutes, Some(Some(30)));
    }
}
