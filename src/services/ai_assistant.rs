use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::db::types::{McqKey, QuestionContent, QuestionKind};

const EVALUATION_SYSTEM_PROMPT: &str = r#"You are an expert evaluator grading student answers.
Evaluate the student's answer against the sample answer and provide:
1. A score (0-100 as a percentage)
2. Detailed feedback
3. Points earned (score * question_points / 100)

Return ONLY a JSON object:
{
  "score": 85,
  "points_earned": 4.25,
  "feedback": "Detailed feedback here"
}"#;

#[derive(Debug, Clone)]
pub(crate) struct AiAssistant {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

/// A generated question candidate that already passed shape validation.
#[derive(Debug, Clone)]
pub(crate) struct QuestionDraft {
    pub(crate) prompt: String,
    pub(crate) content: QuestionContent,
    pub(crate) points: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct Evaluation {
    pub(crate) score: f64,
    pub(crate) points_earned: f64,
    pub(crate) feedback: String,
}

impl AiAssistant {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().api_key.clone(),
            base_url: settings.ai().base_url.trim_end_matches('/').to_string(),
            model: settings.ai().model.clone(),
            max_tokens: settings.ai().max_tokens,
            temperature: settings.ai().temperature,
        })
    }

    pub(crate) async fn generate_questions(
        &self,
        topic: &str,
        kind: QuestionKind,
        count: u32,
    ) -> Result<Vec<QuestionDraft>> {
        tracing::info!(kind = ?kind, count, topic_length = topic.len(), "Generating question drafts");

        let body = self
            .chat(&generation_system_prompt(kind, count), &generation_user_prompt(topic, kind, count))
            .await?;

        let drafts = drafts_from_response(kind, &body)?;
        tracing::info!(valid = drafts.len(), "Question drafts validated");
        Ok(drafts)
    }

    pub(crate) async fn evaluate_answer(
        &self,
        question_prompt: &str,
        sample_answer: Option<&str>,
        user_answer: &str,
        max_points: i32,
    ) -> Result<Evaluation> {
        tracing::info!(
            prompt_length = question_prompt.len(),
            answer_length = user_answer.len(),
            "Evaluating descriptive answer"
        );

        let user_prompt = format!(
            "Question: {question_prompt}\nQuestion points: {max_points}\nSample Answer: {}\nStudent Answer: {user_answer}\n\nEvaluate the student's answer and provide scoring and feedback.",
            sample_answer.unwrap_or("N/A"),
        );

        let body = self.chat(EVALUATION_SYSTEM_PROMPT, &user_prompt).await?;
        let evaluation = evaluation_from_response(&body, max_points);

        tracing::info!(
            score = evaluation.score,
            points_earned = evaluation.points_earned,
            "Answer evaluated"
        );
        Ok(evaluation)
    }

    /// One JSON-mode chat-completions round trip; the parsed message
    /// content is returned as a JSON value.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=2 {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("AI API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call AI API"));
                }
            }

            if attempt < 2 {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt as u32))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .context("Missing AI response content")?;

        serde_json::from_str(content).context("Failed to parse AI JSON")
    }
}

fn kind_label(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Mcq => "MCQ",
        QuestionKind::TrueFalse => "TRUE_FALSE",
        QuestionKind::FillBlank => "FILL_BLANK",
        QuestionKind::Descriptive => "DESCRIPTIVE",
    }
}

fn kind_instructions(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Mcq => {
            "MULTIPLE CHOICE QUESTIONS (MCQ):\n\
             - Create questions with 4-5 well-crafted options\n\
             - Make distractors plausible but clearly incorrect\n\
             - correct_answer must be a single zero-based index, or an array of indices\n\
               for multiple correct answers (example: [0, 2])"
        }
        QuestionKind::TrueFalse => {
            "TRUE/FALSE QUESTIONS:\n\
             - Create clear statements that are definitively true or false\n\
             - correct_answer must be boolean true or false"
        }
        QuestionKind::FillBlank => {
            "FILL-IN-THE-BLANK QUESTIONS:\n\
             - Create sentences with 1-3 blanks marked with [BLANK]\n\
             - correct_answer must be an array of strings, one per blank, in order"
        }
        QuestionKind::Descriptive => {
            "DESCRIPTIVE/ESSAY QUESTIONS:\n\
             - Create open-ended questions that require detailed explanations\n\
             - correct_answer must be a comprehensive sample answer (string)"
        }
    }
}

fn generation_system_prompt(kind: QuestionKind, count: u32) -> String {
    format!(
        "You are an expert educator creating high-quality assessment questions.\n\
         Generate exactly {count} {label} questions for the provided topic.\n\n\
         {instructions}\n\n\
         REQUIREMENTS:\n\
         - Every question MUST have a non-empty prompt and a correct_answer\n\
         - Points should be an integer, typically 1, up to 5 for complex questions\n\n\
         Return ONLY a valid JSON object with this structure:\n\
         {{\"questions\": [{{\"prompt\": \"...\", \"options\": [...], \
         \"correct_answer\": ..., \"points\": 1}}]}}",
        label = kind_label(kind),
        instructions = kind_instructions(kind),
    )
}

fn generation_user_prompt(topic: &str, kind: QuestionKind, count: u32) -> String {
    format!(
        "Generate {count} {label} questions about the following topic:\n\nTOPIC: {topic}\n\n\
         Create diverse questions that thoroughly test understanding of this topic.",
        label = kind_label(kind),
    )
}

/// Pulls the draft list out of the model response, dropping drafts that
/// fail validation. Zero surviving drafts is an error so the caller never
/// silently creates nothing.
pub(crate) fn drafts_from_response(kind: QuestionKind, body: &Value) -> Result<Vec<QuestionDraft>> {
    let questions = body
        .get("questions")
        .and_then(Value::as_array)
        .context("AI response missing questions array")?;

    let mut drafts = Vec::with_capacity(questions.len());
    for (index, raw) in questions.iter().enumerate() {
        match draft_from_value(kind, raw) {
            Some(draft) => drafts.push(draft),
            None => tracing::warn!(index, "Discarding invalid question draft"),
        }
    }

    if drafts.is_empty() {
        bail!("No valid questions were generated: every draft was missing required fields");
    }

    Ok(drafts)
}

fn draft_from_value(kind: QuestionKind, value: &Value) -> Option<QuestionDraft> {
    let prompt = value.get("prompt").and_then(Value::as_str).map(str::trim)?;
    if prompt.is_empty() {
        return None;
    }

    let correct = value.get("correct_answer")?;
    if correct.is_null() {
        return None;
    }

    let content = match kind {
        QuestionKind::Mcq => {
            let options: Vec<String> = value
                .get("options")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|option| option.as_str().map(str::to_string))
                .collect();
            if options.len() < 2 {
                return None;
            }
            let key = mcq_key_from_value(correct, options.len())?;
            QuestionContent::Mcq { options, correct: key }
        }
        QuestionKind::TrueFalse => QuestionContent::TrueFalse { correct: bool_from_value(correct)? },
        QuestionKind::FillBlank => {
            let expected = match correct {
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
                Value::String(single) => vec![single.clone()],
                _ => return None,
            };
            if expected.is_empty() {
                return None;
            }
            QuestionContent::FillBlank { expected }
        }
        QuestionKind::Descriptive => QuestionContent::Descriptive {
            sample_answer: Some(correct.as_str()?.to_string()),
        },
    };

    let points =
        value.get("points").and_then(Value::as_i64).filter(|points| *points > 0).unwrap_or(1);

    Some(QuestionDraft { prompt: prompt.to_string(), content, points: points as i32 })
}

fn mcq_key_from_value(value: &Value, option_count: usize) -> Option<McqKey> {
    let in_range = |index: i64| index >= 0 && (index as usize) < option_count;

    match value {
        Value::Number(_) => {
            let index = value.as_i64()?;
            in_range(index).then_some(McqKey::Single(index))
        }
        Value::Array(items) => {
            let indices =
                items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>()?;
            if indices.is_empty() || !indices.iter().all(|index| in_range(*index)) {
                return None;
            }
            Some(McqKey::Multiple(indices))
        }
        _ => None,
    }
}

fn bool_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Maps the evaluation payload into a clamped [`Evaluation`]. Missing
/// points fall back to score * max / 100; both fields are clamped so a
/// confused model cannot award more than the question is worth.
pub(crate) fn evaluation_from_response(body: &Value, max_points: i32) -> Evaluation {
    let score = body.get("score").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 100.0);
    let points_earned = body
        .get("points_earned")
        .and_then(Value::as_f64)
        .unwrap_or(score * f64::from(max_points) / 100.0)
        .clamp(0.0, f64::from(max_points));
    let feedback = body.get("feedback").and_then(Value::as_str).unwrap_or("").to_string();

    Evaluation { score, points_earned, feedback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drafts_skip_entries_missing_required_fields() {
        let body = json!({
            "questions": [
                {"prompt": "Q1", "options": ["a", "b"], "correct_answer": 0, "points": 1},
                {"prompt": "Q2", "options": ["a", "b"], "correct_answer": null},
                {"prompt": "", "options": ["a", "b"], "correct_answer": 1},
                {"prompt": "Q4", "correct_answer": 1},
                {"prompt": "Q5", "options": ["a", "b", "c"], "correct_answer": [0, 2], "points": 2},
            ]
        });

        let drafts = drafts_from_response(QuestionKind::Mcq, &body).expect("drafts");
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].prompt, "Q1");
        assert_eq!(drafts[1].points, 2);
        assert_eq!(
            drafts[1].content,
            QuestionContent::Mcq {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: McqKey::Multiple(vec![0, 2]),
            }
        );
    }

    #[test]
    fn drafts_error_when_nothing_survives() {
        let body = json!({
            "questions": [
                {"prompt": "Q1", "options": ["a", "b"], "correct_answer": null},
                {"prompt": "Q2", "correct_answer": 0},
            ]
        });

        let result = drafts_from_response(QuestionKind::Mcq, &body);
        assert!(result.is_err());
    }

    #[test]
    fn drafts_reject_out_of_range_mcq_index() {
        let body = json!({
            "questions": [
                {"prompt": "Q1", "options": ["a", "b"], "correct_answer": 5},
            ]
        });

        assert!(drafts_from_response(QuestionKind::Mcq, &body).is_err());
    }

    #[test]
    fn true_false_draft_accepts_string_booleans() {
        let body = json!({
            "questions": [
                {"prompt": "Water boils at 100C at sea level.", "correct_answer": "true"},
            ]
        });

        let drafts = drafts_from_response(QuestionKind::TrueFalse, &body).expect("drafts");
        assert_eq!(drafts[0].content, QuestionContent::TrueFalse { correct: true });
    }

    #[test]
    fn fill_blank_draft_wraps_single_string() {
        let body = json!({
            "questions": [
                {"prompt": "The capital of France is [BLANK].", "correct_answer": "Paris"},
            ]
        });

        let drafts = drafts_from_response(QuestionKind::FillBlank, &body).expect("drafts");
        assert_eq!(
            drafts[0].content,
            QuestionContent::FillBlank { expected: vec!["Paris".into()] }
        );
    }

    #[test]
    fn evaluation_clamps_and_derives_points() {
        let derived = evaluation_from_response(&json!({"score": 50, "feedback": "ok"}), 4);
        assert_eq!(derived.points_earned, 2.0);

        let clamped = evaluation_from_response(
            &json!({"score": 140, "points_earned": 99.0, "feedback": ""}),
            4,
        );
        assert_eq!(clamped.score, 100.0);
        assert_eq!(clamped.points_earned, 4.0);

        let empty = evaluation_from_response(&json!({}), 4);
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.points_earned, 0.0);
    }
}
