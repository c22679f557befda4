use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "questionkind", rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    Mcq,
    TrueFalse,
    FillBlank,
    Descriptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Submitted,
}

/// Answer key for MCQ questions: a single zero-based option index, or a
/// set of indices for multi-select questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum McqKey {
    Single(i64),
    Multiple(Vec<i64>),
}

/// Typed payload of a question. Stored as one JSONB column; everything
/// past the row boundary works with this enum, and scoring is an
/// exhaustive match over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum QuestionContent {
    Mcq { options: Vec<String>, correct: McqKey },
    TrueFalse { correct: bool },
    FillBlank { expected: Vec<String> },
    Descriptive { sample_answer: Option<String> },
}

impl QuestionContent {
    pub(crate) fn kind(&self) -> QuestionKind {
        match self {
            QuestionContent::Mcq { .. } => QuestionKind::Mcq,
            QuestionContent::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionContent::FillBlank { .. } => QuestionKind::FillBlank,
            QuestionContent::Descriptive { .. } => QuestionKind::Descriptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcq_key_deserializes_scalar_and_list() {
        let single: McqKey = serde_json::from_value(serde_json::json!(2)).unwrap();
        assert_eq!(single, McqKey::Single(2));

        let multiple: McqKey = serde_json::from_value(serde_json::json!([0, 2])).unwrap();
        assert_eq!(multiple, McqKey::Multiple(vec![0, 2]));
    }

    #[test]
    fn content_roundtrips_with_type_tag() {
        let content = QuestionContent::Mcq {
            options: vec!["Paris".into(), "London".into()],
            correct: McqKey::Single(0),
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "MCQ");

        let back: QuestionContent = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), QuestionKind::Mcq);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(QuestionContent::TrueFalse { correct: true }.kind(), QuestionKind::TrueFalse);
        assert_eq!(
            QuestionContent::FillBlank { expected: vec![] }.kind(),
            QuestionKind::FillBlank
        );
        assert_eq!(
            QuestionContent::Descriptive { sample_answer: None }.kind(),
            QuestionKind::Descriptive
        );
    }
}
