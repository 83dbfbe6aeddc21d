//! Evaluation submission: scores an application and records the judgment.
//!
//! The record is written in two ordered steps through an [`EvaluationStore`]:
//! the evaluation row first, then one answer-evaluation row per answer
//! under the id the store returned. The steps are not atomic. When the
//! second one fails the evaluation row stays behind without children; the
//! reconciliation task in `tasks::reconciliation` reports those rows.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::core::config::DuplicateEvaluationPolicy;
use crate::core::time::primitive_now_utc;
use crate::db::models::QaPair;
use crate::repositories;
use crate::services::scoring::{self, AnswerJudgment, RatingSheet, ScoreBreakdown, ScoringError};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("application {0} not found")]
    NotFound(String),
    #[error("evaluator already evaluated this application")]
    AlreadyEvaluated,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub(crate) enum EvaluationError {
    #[error("every answer needs a rating before submitting ({} missing)", .missing.len())]
    IncompleteEvaluation { missing: Vec<String> },
    #[error("no authenticated evaluator")]
    Unauthenticated,
    #[error(transparent)]
    RatingRejected(ScoringError),
    #[error("invalid evaluation state: {0}")]
    InvalidState(&'static str),
    #[error("evaluator {evaluator_id} already evaluated application {application_id}")]
    AlreadyEvaluated { application_id: String, evaluator_id: String },
    #[error("failed to insert evaluation")]
    EvaluationInsertFailed(#[source] StoreError),
    #[error("evaluation {evaluation_id} stored without its answer evaluations")]
    AnswerEvaluationInsertFailed {
        evaluation_id: String,
        #[source]
        source: StoreError,
    },
}

impl From<ScoringError> for EvaluationError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Incomplete { missing } => Self::IncompleteEvaluation { missing },
            ScoringError::NoAnswers => Self::InvalidState("application has no answers to score"),
            other => Self::RatingRejected(other),
        }
    }
}

pub(crate) struct NewEvaluation<'a> {
    pub(crate) application_id: &'a str,
    pub(crate) evaluator_id: &'a str,
    pub(crate) final_score: f64,
    pub(crate) policy: DuplicateEvaluationPolicy,
}

/// The data store as seen by the evaluation flow.
#[async_trait]
pub(crate) trait EvaluationStore: Send + Sync {
    /// Question/answer pairs of an application; `NotFound` when the application does not exist.
    async fn fetch_pairs(&self, application_id: &str) -> Result<Vec<QaPair>, StoreError>;

    /// Inserts the evaluation row and returns the id the store assigned.
    /// Under `OncePerEvaluator` the duplicate check and the insert happen
    /// atomically; a repeat yields `AlreadyEvaluated` and writes nothing.
    async fn insert_evaluation(&self, evaluation: NewEvaluation<'_>) -> Result<String, StoreError>;

    /// Inserts all answer evaluations of `evaluation_id` as one batch.
    async fn insert_answer_evaluations(
        &self,
        evaluation_id: &str,
        judgments: &[AnswerJudgment],
    ) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn fetch_pairs(&self, application_id: &str) -> Result<Vec<QaPair>, StoreError> {
        if !repositories::applications::exists(&self.pool, application_id).await? {
            return Err(StoreError::NotFound(application_id.to_string()));
        }
        Ok(repositories::answers::list_qa_pairs(&self.pool, application_id).await?)
    }

    async fn insert_evaluation(&self, evaluation: NewEvaluation<'_>) -> Result<String, StoreError> {
        let params = repositories::evaluations::CreateEvaluation {
            application_id: evaluation.application_id,
            evaluator_id: evaluation.evaluator_id,
            final_score: evaluation.final_score,
            created_at: primitive_now_utc(),
        };

        match evaluation.policy {
            DuplicateEvaluationPolicy::Allow => {
                Ok(repositories::evaluations::create(&self.pool, params).await?)
            }
            DuplicateEvaluationPolicy::OncePerEvaluator => {
                repositories::evaluations::create_once_per_evaluator(&self.pool, params)
                    .await?
                    .ok_or(StoreError::AlreadyEvaluated)
            }
        }
    }

    async fn insert_answer_evaluations(
        &self,
        evaluation_id: &str,
        judgments: &[AnswerJudgment],
    ) -> Result<(), StoreError> {
        let rows: Vec<repositories::evaluations::CreateAnswerEvaluation<'_>> = judgments
            .iter()
            .map(|judgment| repositories::evaluations::CreateAnswerEvaluation {
                answer_id: &judgment.answer_id,
                rating: i16::from(judgment.rating.value()),
                looks_ai: judgment.looks_ai,
            })
            .collect();

        repositories::evaluations::create_answer_evaluations(
            &self.pool,
            evaluation_id,
            &rows,
            primitive_now_utc(),
        )
        .await?;
        Ok(())
    }
}

/// One submission attempt. `sheet` is borrowed so a failed attempt leaves
/// the caller's ratings intact for a retry.
pub(crate) struct Submission<'a> {
    pub(crate) application_id: &'a str,
    pub(crate) evaluator_id: &'a str,
    pub(crate) pairs: &'a [QaPair],
    pub(crate) sheet: &'a RatingSheet,
    pub(crate) policy: DuplicateEvaluationPolicy,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedEvaluation {
    pub(crate) evaluation_id: String,
    pub(crate) breakdown: ScoreBreakdown,
}

pub(crate) async fn submit(
    store: &dyn EvaluationStore,
    submission: Submission<'_>,
) -> Result<SubmittedEvaluation, EvaluationError> {
    let Submission { application_id, evaluator_id, pairs, sheet, policy } = submission;

    if evaluator_id.trim().is_empty() {
        return Err(EvaluationError::Unauthenticated);
    }

    let breakdown = scoring::score(pairs, sheet)?;

    let evaluation_id = store
        .insert_evaluation(NewEvaluation {
            application_id,
            evaluator_id,
            final_score: breakdown.final_score,
            policy,
        })
        .await
        .map_err(|err| {
            if matches!(err, StoreError::AlreadyEvaluated) {
                tracing::info!(application_id, evaluator_id, "Repeat evaluation rejected");
                return EvaluationError::AlreadyEvaluated {
                    application_id: application_id.to_string(),
                    evaluator_id: evaluator_id.to_string(),
                };
            }
            tracing::error!(
                application_id,
                evaluator_id,
                error = %err,
                "Evaluation insert failed; nothing was written"
            );
            metrics::counter!("evaluation_write_failures_total", "step" => "evaluation")
                .increment(1);
            EvaluationError::EvaluationInsertFailed(err)
        })?;

    if let Err(err) = store.insert_answer_evaluations(&evaluation_id, &breakdown.judgments).await {
        tracing::error!(
            application_id,
            evaluator_id,
            evaluation_id = %evaluation_id,
            error = %err,
            "Answer evaluation insert failed; evaluation row is orphaned and needs cleanup"
        );
        metrics::counter!("evaluation_write_failures_total", "step" => "answer_evaluations")
            .increment(1);
        return Err(EvaluationError::AnswerEvaluationInsertFailed { evaluation_id, source: err });
    }

    tracing::info!(
        application_id,
        evaluator_id,
        evaluation_id = %evaluation_id,
        final_score = %breakdown.display_score(),
        answers = breakdown.total_questions,
        flagged_ai = breakdown.flagged_ai,
        "Evaluation submitted"
    );
    metrics::counter!("evaluations_submitted_total").increment(1);
    metrics::histogram!("evaluation_final_score").record(breakdown.final_score);

    Ok(SubmittedEvaluation { evaluation_id, breakdown })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::types::{Department, UserRole};
    use crate::services::scoring::Rating;
    use crate::test_support;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        InsertEvaluation { application_id: String, evaluator_id: String, final_score: f64 },
        InsertAnswers { evaluation_id: String, answer_ids: Vec<String> },
    }

    /// Records every call. `stored` counts evaluation rows it accepted,
    /// which is what the once-per-evaluator check looks at.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<Call>>,
        fail_evaluation: bool,
        fail_answers: bool,
        stored: Mutex<u32>,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn stored(&self) -> u32 {
            *self.stored.lock().unwrap()
        }

        fn answer_inserts(&self) -> usize {
            self.calls().iter().filter(|call| matches!(call, Call::InsertAnswers { .. })).count()
        }
    }

    fn store_failure() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl EvaluationStore for RecordingStore {
        async fn fetch_pairs(&self, application_id: &str) -> Result<Vec<QaPair>, StoreError> {
            Err(StoreError::NotFound(application_id.to_string()))
        }

        async fn insert_evaluation(
            &self,
            evaluation: NewEvaluation<'_>,
        ) -> Result<String, StoreError> {
            self.calls.lock().unwrap().push(Call::InsertEvaluation {
                application_id: evaluation.application_id.to_string(),
                evaluator_id: evaluation.evaluator_id.to_string(),
                final_score: evaluation.final_score,
            });
            if self.fail_evaluation {
                return Err(store_failure());
            }
            let mut stored = self.stored.lock().unwrap();
            if evaluation.policy == DuplicateEvaluationPolicy::OncePerEvaluator && *stored > 0 {
                return Err(StoreError::AlreadyEvaluated);
            }
            *stored += 1;
            Ok(format!("evaluation-{}", *stored))
        }

        async fn insert_answer_evaluations(
            &self,
            evaluation_id: &str,
            judgments: &[AnswerJudgment],
        ) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(Call::InsertAnswers {
                evaluation_id: evaluation_id.to_string(),
                answer_ids: judgments.iter().map(|j| j.answer_id.clone()).collect(),
            });
            if self.fail_answers {
                return Err(store_failure());
            }
            Ok(())
        }
    }

    fn pairs(count: usize) -> Vec<QaPair> {
        (0..count)
            .map(|index| QaPair {
                id: format!("answer-{index}"),
                question: format!("Question {index}"),
                answer: format!("Answer {index}"),
            })
            .collect()
    }

    fn sheet(pairs: &[QaPair], ratings: &[Option<i64>], flags: &[bool]) -> RatingSheet {
        let mut sheet = RatingSheet::for_pairs(pairs);
        for ((pair, rating), looks_ai) in pairs.iter().zip(ratings).zip(flags) {
            if let Some(rating) = rating {
                sheet.rate(&pair.id, Rating::new(*rating).unwrap()).unwrap();
            }
            sheet.set_looks_ai(&pair.id, *looks_ai).unwrap();
        }
        sheet
    }

    fn submission<'a>(
        pairs: &'a [QaPair],
        sheet: &'a RatingSheet,
        evaluator_id: &'a str,
        policy: DuplicateEvaluationPolicy,
    ) -> Submission<'a> {
        Submission { application_id: "application-1", evaluator_id, pairs, sheet, policy }
    }

    #[tokio::test]
    async fn writes_evaluation_then_one_answer_row_per_pair() {
        let store = RecordingStore::default();
        let pairs = pairs(2);
        let sheet = sheet(&pairs, &[Some(7), Some(9)], &[false, true]);

        let submitted = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .expect("submit");

        assert_eq!(submitted.evaluation_id, "evaluation-1");
        assert_eq!(submitted.breakdown.display_score(), "54.00");

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            Call::InsertEvaluation { application_id, evaluator_id, final_score } => {
                assert_eq!(application_id, "application-1");
                assert_eq!(evaluator_id, "evaluator-1");
                assert!((final_score - 54.0).abs() < 1e-9);
            }
            other => panic!("unexpected first call: {other:?}"),
        }
        assert_eq!(
            calls[1],
            Call::InsertAnswers {
                evaluation_id: "evaluation-1".to_string(),
                answer_ids: vec!["answer-0".to_string(), "answer-1".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn incomplete_sheet_writes_nothing() {
        let store = RecordingStore::default();
        let pairs = pairs(3);
        let sheet = sheet(&pairs, &[Some(4), None, Some(6)], &[false, false, false]);

        let err = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .unwrap_err();

        match err {
            EvaluationError::IncompleteEvaluation { missing } => {
                assert_eq!(missing, vec!["answer-1".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_evaluator_is_unauthenticated() {
        let store = RecordingStore::default();
        let pairs = pairs(1);
        let sheet = sheet(&pairs, &[Some(5)], &[false]);

        let err = submit(&store, submission(&pairs, &sheet, " ", DuplicateEvaluationPolicy::Allow))
            .await
            .unwrap_err();

        assert!(matches!(err, EvaluationError::Unauthenticated));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_answers_is_invalid_state() {
        let store = RecordingStore::default();
        let sheet = RatingSheet::default();

        let err =
            submit(&store, submission(&[], &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow))
                .await
                .unwrap_err();

        assert!(matches!(err, EvaluationError::InvalidState(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_evaluation_insert_skips_answer_insert() {
        let store = RecordingStore { fail_evaluation: true, ..Default::default() };
        let pairs = pairs(2);
        let sheet = sheet(&pairs, &[Some(3), Some(3)], &[false, false]);

        let err = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EvaluationError::EvaluationInsertFailed(_)));
        assert_eq!(store.calls().len(), 1);
        assert!(matches!(store.calls()[0], Call::InsertEvaluation { .. }));
        assert_eq!(store.answer_inserts(), 0);
    }

    #[tokio::test]
    async fn failed_answer_insert_reports_the_orphaned_evaluation() {
        let store = RecordingStore { fail_answers: true, ..Default::default() };
        let pairs = pairs(2);
        let sheet = sheet(&pairs, &[Some(8), Some(2)], &[true, false]);

        let err = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .unwrap_err();

        match err {
            EvaluationError::AnswerEvaluationInsertFailed { evaluation_id, .. } => {
                assert_eq!(evaluation_id, "evaluation-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.stored(), 1);
        assert_eq!(store.answer_inserts(), 1);
    }

    #[tokio::test]
    async fn resubmission_creates_a_new_evaluation_with_the_same_score() {
        let store = RecordingStore::default();
        let pairs = pairs(2);
        let sheet = sheet(&pairs, &[Some(6), Some(10)], &[false, false]);

        let first = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .unwrap();
        let second = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::Allow),
        )
        .await
        .unwrap();

        assert_ne!(first.evaluation_id, second.evaluation_id);
        assert_eq!(first.breakdown.final_score, second.breakdown.final_score);
        assert_eq!(store.stored(), 2);
    }

    #[tokio::test]
    async fn once_per_evaluator_rejects_repeat_without_writing_answers() {
        let store = RecordingStore::default();
        let pairs = pairs(1);
        let sheet = sheet(&pairs, &[Some(9)], &[false]);

        submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::OncePerEvaluator),
        )
        .await
        .expect("first submission");

        let err = submit(
            &store,
            submission(&pairs, &sheet, "evaluator-1", DuplicateEvaluationPolicy::OncePerEvaluator),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EvaluationError::AlreadyEvaluated { .. }));
        assert_eq!(store.stored(), 1);
        assert_eq!(store.answer_inserts(), 1);
    }

    #[tokio::test]
    async fn concurrent_once_per_evaluator_submissions_store_one_evaluation() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let evaluator = test_support::insert_user(db, "Erin Evaluator", UserRole::Evaluator).await;
        let applicant = test_support::insert_user(db, "Alex Applicant", UserRole::Applicant).await;
        let application =
            test_support::insert_application(db, &applicant, Department::Technical).await;
        test_support::insert_answer(db, &application, "ans-1", "Why?", "Because").await;

        let store = PgEvaluationStore::new(db.clone());
        let pairs = store.fetch_pairs(&application).await.expect("pairs");
        let sheet = sheet(&pairs, &[Some(6)], &[false]);
        let attempt = || {
            submit(
                &store,
                Submission {
                    application_id: &application,
                    evaluator_id: &evaluator,
                    pairs: &pairs,
                    sheet: &sheet,
                    policy: DuplicateEvaluationPolicy::OncePerEvaluator,
                },
            )
        };

        let (first, second, third) = tokio::join!(attempt(), attempt(), attempt());
        let results = [first, second, third];

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|result| matches!(result, Err(EvaluationError::AlreadyEvaluated { .. })))
                .count(),
            2
        );

        let stored: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM evaluations WHERE application_id = $1 AND evaluator_id = $2",
        )
        .bind(&application)
        .bind(&evaluator)
        .fetch_one(db)
        .await
        .expect("count evaluations");
        assert_eq!(stored, 1);
    }
}
