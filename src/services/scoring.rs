use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Attempt, Question};
use crate::db::types::{AttemptStatus, McqKey, QuestionContent};
use crate::repositories;
use crate::services::ai_assistant::AiAssistant;

/// Fraction of the question's points an AI-graded answer must earn to
/// count as correct.
const AI_CORRECT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Error)]
pub(crate) enum SubmitError {
    #[error("Attempt not found")]
    NotFound,
    #[error("Attempt has already been submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of grading one answer. `is_correct` stays `None` when grading
/// was not possible, for descriptive answers awaiting manual review.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreOutcome {
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) feedback: Option<String>,
}

impl ScoreOutcome {
    fn graded(is_correct: bool, points_earned: f64) -> Self {
        Self { is_correct: Some(is_correct), points_earned, feedback: None }
    }

    fn ungraded() -> Self {
        Self { is_correct: None, points_earned: 0.0, feedback: None }
    }
}

pub(crate) struct ScoringEngine<'a> {
    ai: Option<&'a AiAssistant>,
    allow_ai_evaluation: bool,
}

impl<'a> ScoringEngine<'a> {
    pub(crate) fn new(ai: Option<&'a AiAssistant>, allow_ai_evaluation: bool) -> Self {
        Self { ai, allow_ai_evaluation }
    }

    pub(crate) async fn score(
        &self,
        prompt: &str,
        content: &QuestionContent,
        points: i32,
        answer_text: &str,
    ) -> ScoreOutcome {
        match content {
            QuestionContent::Mcq { correct, .. } => score_mcq(correct, points, answer_text),
            QuestionContent::TrueFalse { correct } => {
                score_true_false(*correct, points, answer_text)
            }
            QuestionContent::FillBlank { expected } => {
                score_fill_blank(expected, points, answer_text)
            }
            QuestionContent::Descriptive { sample_answer } => {
                self.score_descriptive(prompt, sample_answer.as_deref(), points, answer_text).await
            }
        }
    }

    async fn score_descriptive(
        &self,
        prompt: &str,
        sample_answer: Option<&str>,
        points: i32,
        answer_text: &str,
    ) -> ScoreOutcome {
        let Some(ai) = self.ai.filter(|_| self.allow_ai_evaluation) else {
            return ScoreOutcome::ungraded();
        };

        match ai.evaluate_answer(prompt, sample_answer, answer_text, points).await {
            Ok(evaluation) => ScoreOutcome {
                is_correct: Some(
                    evaluation.points_earned >= AI_CORRECT_THRESHOLD * f64::from(points),
                ),
                points_earned: evaluation.points_earned,
                feedback: Some(evaluation.feedback),
            },
            // Grading failures never block submission; the answer is left
            // for manual review with the failure recorded as feedback.
            Err(err) => {
                tracing::error!(error = %err, "AI evaluation failed");
                ScoreOutcome {
                    is_correct: None,
                    points_earned: 0.0,
                    feedback: Some(format!("AI evaluation failed: {err}")),
                }
            }
        }
    }
}

fn score_mcq(correct: &McqKey, points: i32, answer_text: &str) -> ScoreOutcome {
    let is_correct = match correct {
        McqKey::Single(expected) => {
            answer_text.trim().parse::<i64>().map(|chosen| chosen == *expected).unwrap_or(false)
        }
        McqKey::Multiple(expected) => {
            let chosen: Option<BTreeSet<i64>> = answer_text
                .split(',')
                .map(|part| part.trim().parse::<i64>().ok())
                .collect();
            match chosen {
                Some(chosen) => chosen == expected.iter().copied().collect::<BTreeSet<_>>(),
                None => false,
            }
        }
    };

    ScoreOutcome::graded(is_correct, if is_correct { f64::from(points) } else { 0.0 })
}

fn score_true_false(correct: bool, points: i32, answer_text: &str) -> ScoreOutcome {
    let normalized = answer_text.trim().to_lowercase();
    let chosen = matches!(normalized.as_str(), "true" | "1" | "yes");
    let is_correct = chosen == correct;

    ScoreOutcome::graded(is_correct, if is_correct { f64::from(points) } else { 0.0 })
}

/// Blanks are compared positionally after trimming and lowercasing, and
/// each blank earns a proportional share of the question's points.
fn score_fill_blank(expected: &[String], points: i32, answer_text: &str) -> ScoreOutcome {
    if expected.is_empty() {
        return ScoreOutcome::graded(true, 0.0);
    }

    let given: Vec<String> =
        answer_text.split('|').map(|part| part.trim().to_lowercase()).collect();

    let matched = expected
        .iter()
        .enumerate()
        .filter(|(index, blank)| {
            given.get(*index).map(|answer| *answer == blank.trim().to_lowercase()).unwrap_or(false)
        })
        .count();

    let is_correct = matched == expected.len();
    let earned = f64::from(points) * matched as f64 / expected.len() as f64;

    ScoreOutcome::graded(is_correct, earned)
}

/// Grades every saved answer and closes the attempt.
///
/// AI calls run before the database transaction opens so a slow model
/// never holds locks. The status flip inside [`finalize_submission`] is
/// conditional on the attempt still being in progress; when a concurrent
/// submit wins that race, this call rolls back and reports
/// [`SubmitError::AlreadySubmitted`].
///
/// [`finalize_submission`]: repositories::attempts::finalize_submission
pub(crate) async fn submit_attempt(
    state: &AppState,
    attempt_id: &str,
) -> Result<(Attempt, Vec<Answer>), SubmitError> {
    let pool = state.db();

    let attempt = repositories::attempts::find_by_id(pool, attempt_id)
        .await?
        .ok_or(SubmitError::NotFound)?;
    if attempt.status == AttemptStatus::Submitted {
        return Err(SubmitError::AlreadySubmitted);
    }

    let allow_ai_evaluation = repositories::quizzes::find_settings(pool, &attempt.quiz_id)
        .await?
        .map(|settings| settings.allow_ai_evaluation)
        .unwrap_or(false);

    let questions = repositories::questions::list_by_quiz(pool, &attempt.quiz_id).await?;
    let answers = repositories::attempts::list_answers(pool, attempt_id).await?;

    let by_id: HashMap<&str, &Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let engine = ScoringEngine::new(state.ai(), allow_ai_evaluation);

    let mut total_points = 0.0;
    let mut earned = 0.0;
    let mut scores = Vec::with_capacity(answers.len());

    for answer in &answers {
        // Answers whose question was deleted mid-attempt score nothing.
        let Some(question) = by_id.get(answer.question_id.as_str()) else {
            continue;
        };

        let outcome = engine
            .score(&question.prompt, &question.content.0, question.points, &answer.answer_text)
            .await;

        total_points += f64::from(question.points);
        earned += outcome.points_earned;
        scores.push(repositories::attempts::AnswerScore {
            answer_id: answer.id.clone(),
            is_correct: outcome.is_correct,
            points_earned: outcome.points_earned,
            ai_feedback: outcome.feedback,
        });
    }

    let submitted_at = primitive_now_utc();
    let updated = repositories::attempts::finalize_submission(
        pool,
        attempt_id,
        &scores,
        earned,
        total_points,
        submitted_at,
    )
    .await?;

    if !updated {
        return Err(SubmitError::AlreadySubmitted);
    }

    tracing::info!(
        attempt_id,
        score = earned,
        total_points,
        answers = scores.len(),
        "Attempt submitted"
    );

    let attempt = repositories::attempts::find_by_id(pool, attempt_id)
        .await?
        .ok_or(SubmitError::NotFound)?;
    let answers = repositories::attempts::list_answers(pool, attempt_id).await?;
    Ok((attempt, answers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(is_correct: Option<bool>, points_earned: f64) -> ScoreOutcome {
        ScoreOutcome { is_correct, points_earned, feedback: None }
    }

    #[test]
    fn mcq_single_matches_exact_index() {
        let key = McqKey::Single(2);
        assert_eq!(score_mcq(&key, 3, "2"), outcome(Some(true), 3.0));
        assert_eq!(score_mcq(&key, 3, " 2 "), outcome(Some(true), 3.0));
        assert_eq!(score_mcq(&key, 3, "1"), outcome(Some(false), 0.0));
    }

    #[test]
    fn mcq_single_rejects_unparseable_answers() {
        let key = McqKey::Single(0);
        assert_eq!(score_mcq(&key, 1, "zero"), outcome(Some(false), 0.0));
        assert_eq!(score_mcq(&key, 1, ""), outcome(Some(false), 0.0));
        assert_eq!(score_mcq(&key, 1, "0,1"), outcome(Some(false), 0.0));
    }

    #[test]
    fn mcq_multiple_uses_set_equality() {
        let key = McqKey::Multiple(vec![0, 2]);
        assert_eq!(score_mcq(&key, 4, "2,0"), outcome(Some(true), 4.0));
        assert_eq!(score_mcq(&key, 4, "0, 2"), outcome(Some(true), 4.0));
        assert_eq!(score_mcq(&key, 4, "0,2,2"), outcome(Some(true), 4.0));
        assert_eq!(score_mcq(&key, 4, "0"), outcome(Some(false), 0.0));
        assert_eq!(score_mcq(&key, 4, "0,1,2"), outcome(Some(false), 0.0));
        assert_eq!(score_mcq(&key, 4, "0,x"), outcome(Some(false), 0.0));
    }

    #[test]
    fn true_false_accepts_affirmative_spellings() {
        for answer in ["true", "TRUE", "1", "yes", " Yes "] {
            assert_eq!(score_true_false(true, 2, answer), outcome(Some(true), 2.0));
        }
        for answer in ["false", "0", "no", "maybe", ""] {
            assert_eq!(score_true_false(true, 2, answer), outcome(Some(false), 0.0));
        }
        assert_eq!(score_true_false(false, 2, "no"), outcome(Some(true), 2.0));
        assert_eq!(score_true_false(false, 2, "yes"), outcome(Some(false), 0.0));
    }

    #[test]
    fn fill_blank_awards_proportional_credit() {
        let expected = vec!["Paris".to_string(), "Seine".to_string()];
        assert_eq!(score_fill_blank(&expected, 4, "paris | seine"), outcome(Some(true), 4.0));
        assert_eq!(score_fill_blank(&expected, 4, "PARIS|thames"), outcome(Some(false), 2.0));
        assert_eq!(score_fill_blank(&expected, 4, "london|thames"), outcome(Some(false), 0.0));
    }

    #[test]
    fn fill_blank_compares_positionally() {
        let expected = vec!["a".to_string(), "b".to_string()];
        assert_eq!(score_fill_blank(&expected, 2, "b|a"), outcome(Some(false), 0.0));
        assert_eq!(score_fill_blank(&expected, 2, "a"), outcome(Some(false), 1.0));
        assert_eq!(score_fill_blank(&expected, 2, "a|b|c"), outcome(Some(true), 2.0));
    }

    #[test]
    fn fill_blank_with_no_expected_blanks_is_vacuously_correct() {
        assert_eq!(score_fill_blank(&[], 5, "anything"), outcome(Some(true), 0.0));
    }

    #[tokio::test]
    async fn descriptive_without_ai_stays_ungraded() {
        let engine = ScoringEngine::new(None, true);
        let content = QuestionContent::Descriptive { sample_answer: Some("sample".into()) };
        let result = engine.score("Explain.", &content, 5, "my essay").await;
        assert_eq!(result, outcome(None, 0.0));
    }

    #[tokio::test]
    async fn mixed_answers_accumulate_earned_points() {
        let engine = ScoringEngine::new(None, false);

        let mcq = QuestionContent::Mcq {
            options: vec!["a".into(), "b".into(), "c".into()],
            correct: McqKey::Single(1),
        };
        let blank = QuestionContent::FillBlank {
            expected: vec!["red".to_string(), "blue".to_string()],
        };

        let first = engine.score("Pick one", &mcq, 2, "1").await;
        let second = engine.score("Fill in", &blank, 4, "red|green").await;

        let earned = first.points_earned + second.points_earned;
        assert_eq!(earned, 4.0);
        assert_eq!(first.is_correct, Some(true));
        assert_eq!(second.is_correct, Some(false));
    }
}
