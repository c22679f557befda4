use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::{McqKey, QuestionContent, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    #[validate(length(min = 1, message = "Prompt must not be empty"))]
    pub(crate) prompt: String,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: Option<Value>,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 100, message = "Points must be between 1 and 100"))]
    pub(crate) points: i32,
}

fn default_points() -> i32 {
    1
}

impl QuestionCreate {
    pub(crate) fn build_content(&self) -> Result<QuestionContent, String> {
        build_content(self.kind, self.options.as_deref(), self.correct_answer.as_ref())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(rename = "type")]
    pub(crate) kind: Option<QuestionKind>,
    #[validate(length(min = 1, message = "Prompt must not be empty"))]
    pub(crate) prompt: Option<String>,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: Option<Value>,
    #[validate(range(min = 1, max = 100, message = "Points must be between 1 and 100"))]
    pub(crate) points: Option<i32>,
    pub(crate) position: Option<i32>,
}

impl QuestionUpdate {
    /// A content change is rebuilt and revalidated as one unit. Fields
    /// that were not supplied fall back to the current content, so an
    /// options-only update keeps the existing answer key (which is then
    /// checked against the new option count). Changing the kind always
    /// requires a fresh key.
    pub(crate) fn build_content(
        &self,
        current: &QuestionContent,
    ) -> Result<Option<QuestionContent>, String> {
        if self.kind.is_none() && self.options.is_none() && self.correct_answer.is_none() {
            return Ok(None);
        }

        let kind = self.kind.unwrap_or_else(|| current.kind());
        let kind_changed = kind != current.kind();

        let existing_options = match current {
            QuestionContent::Mcq { options, .. } if !kind_changed => Some(options.clone()),
            _ => None,
        };
        let options = self.options.clone().or(existing_options);

        let correct_answer = match &self.correct_answer {
            Some(value) => Some(value.clone()),
            None if kind_changed => {
                return Err(
                    "correct_answer is required when changing the question type".to_string()
                )
            }
            None => answer_key(current),
        };

        build_content(kind, options.as_deref(), correct_answer.as_ref()).map(Some)
    }
}

/// Builds the typed question payload from the loosely-typed API fields,
/// rejecting shapes that do not fit the declared question type.
fn build_content(
    kind: QuestionKind,
    options: Option<&[String]>,
    correct_answer: Option<&Value>,
) -> Result<QuestionContent, String> {
    match kind {
        QuestionKind::Mcq => {
            let options = options.ok_or("MCQ questions require options")?.to_vec();
            if options.len() < 2 {
                return Err("MCQ questions require at least 2 options".to_string());
            }
            let correct = correct_answer.ok_or("MCQ questions require a correct_answer")?;
            let key = mcq_key(correct, options.len())?;
            Ok(QuestionContent::Mcq { options, correct: key })
        }
        QuestionKind::TrueFalse => {
            let correct = correct_answer
                .and_then(Value::as_bool)
                .ok_or("TRUE_FALSE questions require a boolean correct_answer")?;
            Ok(QuestionContent::TrueFalse { correct })
        }
        QuestionKind::FillBlank => {
            let expected = match correct_answer {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or("FILL_BLANK answers must be strings")?,
                Some(Value::String(single)) => vec![single.clone()],
                _ => {
                    return Err(
                        "FILL_BLANK questions require a correct_answer string or array".to_string()
                    )
                }
            };
            if expected.is_empty() || expected.iter().any(|blank| blank.trim().is_empty()) {
                return Err("FILL_BLANK answers must be non-empty".to_string());
            }
            Ok(QuestionContent::FillBlank { expected })
        }
        QuestionKind::Descriptive => {
            let sample_answer = match correct_answer {
                None | Some(Value::Null) => None,
                Some(Value::String(sample)) => Some(sample.clone()),
                Some(_) => {
                    return Err("DESCRIPTIVE sample answers must be strings".to_string());
                }
            };
            Ok(QuestionContent::Descriptive { sample_answer })
        }
    }
}

fn mcq_key(value: &Value, option_count: usize) -> Result<McqKey, String> {
    let check = |index: i64| -> Result<i64, String> {
        if index < 0 || index as usize >= option_count {
            Err(format!("correct_answer index {index} is out of range"))
        } else {
            Ok(index)
        }
    };

    match value {
        Value::Number(_) => {
            let index = value.as_i64().ok_or("correct_answer must be an integer index")?;
            Ok(McqKey::Single(check(index)?))
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err("correct_answer must name at least one option".to_string());
            }
            let indices = items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .ok_or_else(|| "correct_answer must contain integer indexes".to_string())
                        .and_then(check)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(McqKey::Multiple(indices))
        }
        _ => Err("correct_answer must be an index or a list of indexes".to_string()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateRequest {
    #[validate(length(min = 1, max = 10_000, message = "Topic must be 1 to 10000 characters"))]
    pub(crate) topic: String,
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 20, message = "Count must be between 1 and 20"))]
    pub(crate) count: u32,
}

fn default_count() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReorderRequest {
    pub(crate) positions: HashMap<String, i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<Value>,
    pub(crate) points: i32,
    pub(crate) position: i32,
    pub(crate) created_at: String,
}

impl QuestionResponse {
    /// `include_answers` gates the answer key; participant-facing routes
    /// pass false so keys never leave the server.
    pub(crate) fn from_db(question: &Question, include_answers: bool) -> Self {
        let content = &question.content.0;

        let options = match content {
            QuestionContent::Mcq { options, .. } => Some(options.clone()),
            _ => None,
        };

        let correct_answer = include_answers.then(|| answer_key(content)).flatten();

        Self {
            id: question.id.clone(),
            quiz_id: question.quiz_id.clone(),
            kind: question.kind,
            prompt: question.prompt.clone(),
            options,
            correct_answer,
            points: question.points,
            position: question.position,
            created_at: format_primitive(question.created_at),
        }
    }
}

fn answer_key(content: &QuestionContent) -> Option<Value> {
    match content {
        QuestionContent::Mcq { correct, .. } => serde_json::to_value(correct).ok(),
        QuestionContent::TrueFalse { correct } => Some(Value::Bool(*correct)),
        QuestionContent::FillBlank { expected } => serde_json::to_value(expected).ok(),
        QuestionContent::Descriptive { sample_answer } => {
            sample_answer.as_ref().map(|sample| Value::String(sample.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(kind: QuestionKind, options: Option<Vec<&str>>, correct: Value) -> QuestionCreate {
        QuestionCreate {
            kind,
            prompt: "Q".to_string(),
            options: options.map(|opts| opts.into_iter().map(str::to_string).collect()),
            correct_answer: Some(correct),
            points: 1,
        }
    }

    #[test]
    fn mcq_content_requires_options_and_in_range_key() {
        let ok = create(QuestionKind::Mcq, Some(vec!["a", "b", "c"]), json!([0, 2]));
        assert_eq!(
            ok.build_content().unwrap(),
            QuestionContent::Mcq {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: McqKey::Multiple(vec![0, 2]),
            }
        );

        let missing_options = create(QuestionKind::Mcq, None, json!(0));
        assert!(missing_options.build_content().is_err());

        let one_option = create(QuestionKind::Mcq, Some(vec!["a"]), json!(0));
        assert!(one_option.build_content().is_err());

        let out_of_range = create(QuestionKind::Mcq, Some(vec!["a", "b"]), json!(2));
        assert!(out_of_range.build_content().is_err());
    }

    #[test]
    fn true_false_content_requires_boolean() {
        let ok = create(QuestionKind::TrueFalse, None, json!(true));
        assert_eq!(ok.build_content().unwrap(), QuestionContent::TrueFalse { correct: true });

        let stringly = create(QuestionKind::TrueFalse, None, json!("true"));
        assert!(stringly.build_content().is_err());
    }

    #[test]
    fn fill_blank_content_accepts_string_or_array() {
        let single = create(QuestionKind::FillBlank, None, json!("Paris"));
        assert_eq!(
            single.build_content().unwrap(),
            QuestionContent::FillBlank { expected: vec!["Paris".into()] }
        );

        let multi = create(QuestionKind::FillBlank, None, json!(["red", "blue"]));
        assert_eq!(
            multi.build_content().unwrap(),
            QuestionContent::FillBlank { expected: vec!["red".into(), "blue".into()] }
        );

        let blank = create(QuestionKind::FillBlank, None, json!(["red", "  "]));
        assert!(blank.build_content().is_err());
    }

    #[test]
    fn descriptive_sample_answer_is_optional() {
        let with_sample = create(QuestionKind::Descriptive, None, json!("A sample."));
        assert_eq!(
            with_sample.build_content().unwrap(),
            QuestionContent::Descriptive { sample_answer: Some("A sample.".into()) }
        );

        let without = QuestionCreate {
            kind: QuestionKind::Descriptive,
            prompt: "Q".to_string(),
            options: None,
            correct_answer: None,
            points: 1,
        };
        assert_eq!(
            without.build_content().unwrap(),
            QuestionContent::Descriptive { sample_answer: None }
        );
    }

    #[test]
    fn update_reuses_existing_mcq_options() {
        let current = QuestionContent::Mcq {
            options: vec!["a".into(), "b".into()],
            correct: McqKey::Single(0),
        };
        let update: QuestionUpdate = serde_json::from_value(json!({"correct_answer": 1})).unwrap();

        let rebuilt = update.build_content(&current).unwrap().unwrap();
        assert_eq!(
            rebuilt,
            QuestionContent::Mcq {
                options: vec!["a".into(), "b".into()],
                correct: McqKey::Single(1),
            }
        );
    }

    #[test]
    fn update_with_options_only_keeps_existing_key_in_range() {
        let current = QuestionContent::Mcq {
            options: vec!["a".into(), "b".into(), "c".into()],
            correct: McqKey::Single(2),
        };

        let grown: QuestionUpdate =
            serde_json::from_value(json!({"options": ["a", "b", "c", "d"]})).unwrap();
        let rebuilt = grown.build_content(&current).unwrap().unwrap();
        assert_eq!(
            rebuilt,
            QuestionContent::Mcq {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct: McqKey::Single(2),
            }
        );

        let shrunk: QuestionUpdate =
            serde_json::from_value(json!({"options": ["a", "b"]})).unwrap();
        assert!(shrunk.build_content(&current).is_err());
    }

    #[test]
    fn update_changing_kind_requires_a_fresh_key() {
        let current = QuestionContent::TrueFalse { correct: true };
        let update: QuestionUpdate = serde_json::from_value(json!({"type": "MCQ"})).unwrap();
        assert!(update.build_content(&current).is_err());
    }

    #[test]
    fn update_without_content_fields_keeps_current_content() {
        let current = QuestionContent::TrueFalse { correct: true };
        let update: QuestionUpdate =
            serde_json::from_value(json!({"prompt": "Reworded", "points": 2})).unwrap();
        assert_eq!(update.build_content(&current).unwrap(), None);
    }

    #[test]
    fn response_hides_answer_key_unless_requested() {
        use crate::core::time::primitive_now_utc;
        use sqlx::types::Json;

        let question = Question {
            id: "q1".into(),
            quiz_id: "z1".into(),
            kind: QuestionKind::Mcq,
            prompt: "Pick".into(),
            content: Json(QuestionContent::Mcq {
                options: vec!["a".into(), "b".into()],
                correct: McqKey::Single(1),
            }),
            points: 2,
            position: 0,
            created_at: primitive_now_utc(),
        };

        let public = QuestionResponse::from_db(&question, false);
        assert_eq!(public.options.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(public.correct_answer.is_none());

        let owner = QuestionResponse::from_db(&question, true);
        assert_eq!(owner.correct_answer, Some(json!(1)));
    }
}
