use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{AnswerEvaluation, Evaluation};
use crate::services::scoring::{format_score, ScoreBreakdown};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitEvaluationRequest {
    #[validate(nested)]
    pub(crate) ratings: Vec<RatingInput>,
}

/// One answer's judgment. `rating` may be omitted; the submission is then
/// rejected as incomplete rather than as malformed.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RatingInput {
    pub(crate) answer_id: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 10, message = "rating must be between 1 and 10"))]
    pub(crate) rating: Option<i64>,
    #[serde(default)]
    pub(crate) looks_ai: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreBreakdownResponse {
    pub(crate) total_questions: usize,
    pub(crate) max_points: u32,
    pub(crate) collected_points: u32,
    pub(crate) flagged_ai: usize,
    pub(crate) raw_score: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitEvaluationResponse {
    pub(crate) evaluation_id: String,
    pub(crate) final_score: f64,
    pub(crate) display_score: String,
    pub(crate) breakdown: ScoreBreakdownResponse,
}

impl SubmitEvaluationResponse {
    pub(crate) fn new(evaluation_id: String, breakdown: &ScoreBreakdown) -> Self {
        Self {
            evaluation_id,
            final_score: breakdown.final_score,
            display_score: breakdown.display_score(),
            breakdown: ScoreBreakdownResponse {
                total_questions: breakdown.total_questions,
                max_points: breakdown.max_points,
                collected_points: breakdown.collected_points,
                flagged_ai: breakdown.flagged_ai,
                raw_score: breakdown.raw_score,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerEvaluationResponse {
    pub(crate) answer_id: String,
    pub(crate) rating: i16,
    pub(crate) looks_ai: bool,
}

impl From<AnswerEvaluation> for AnswerEvaluationResponse {
    fn from(row: AnswerEvaluation) -> Self {
        Self { answer_id: row.answer_id, rating: row.rating, looks_ai: row.looks_ai }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationResponse {
    pub(crate) id: String,
    pub(crate) application_id: String,
    pub(crate) evaluator_id: String,
    pub(crate) final_score: f64,
    pub(crate) display_score: String,
    pub(crate) created_at: String,
    pub(crate) answers: Vec<AnswerEvaluationResponse>,
}

impl EvaluationResponse {
    pub(crate) fn from_db(evaluation: Evaluation, answers: Vec<AnswerEvaluation>) -> Self {
        Self {
            display_score: format_score(evaluation.final_score),
            id: evaluation.id,
            application_id: evaluation.application_id,
            evaluator_id: evaluation.evaluator_id,
            final_score: evaluation.final_score,
            created_at: format_primitive(evaluation.created_at),
            answers: answers.into_iter().map(AnswerEvaluationResponse::from).collect(),
        }
    }
}
