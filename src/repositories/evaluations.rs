use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AnswerEvaluation, Evaluation};

const COLUMNS: &str = "id, application_id, evaluator_id, final_score, created_at";

const ANSWER_COLUMNS: &str = "id, evaluation_id, answer_id, rating, looks_ai, created_at";

pub(crate) struct CreateEvaluation<'a> {
    pub application_id: &'a str,
    pub evaluator_id: &'a str,
    pub final_score: f64,
    pub created_at: PrimitiveDateTime,
}

pub(crate) struct CreateAnswerEvaluation<'a> {
    pub answer_id: &'a str,
    pub rating: i16,
    pub looks_ai: bool,
}

/// Inserts the parent evaluation row and returns its id.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateEvaluation<'_>,
) -> Result<String, sqlx::Error> {
    insert(pool, &params).await
}

/// Inserts the evaluation unless the evaluator already has one for the
/// application; `None` means nothing was written. A transaction-scoped
/// advisory lock on the (application, evaluator) pair serializes concurrent
/// attempts so only one of them can pass the check.
pub(crate) async fn create_once_per_evaluator(
    pool: &PgPool,
    params: CreateEvaluation<'_>,
) -> Result<Option<String>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2, 0))")
        .bind(params.application_id)
        .bind(params.evaluator_id)
        .execute(&mut *tx)
        .await?;

    if count_by_evaluator(&mut *tx, params.application_id, params.evaluator_id).await? > 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let id = insert(&mut *tx, &params).await?;
    tx.commit().await?;
    Ok(Some(id))
}

async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    params: &CreateEvaluation<'_>,
) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "INSERT INTO evaluations (id, application_id, evaluator_id, final_score, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(params.application_id)
    .bind(params.evaluator_id)
    .bind(params.final_score)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

/// Inserts all answer judgments of one evaluation in a single statement.
pub(crate) async fn create_answer_evaluations(
    pool: &PgPool,
    evaluation_id: &str,
    rows: &[CreateAnswerEvaluation<'_>],
    created_at: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO answer_evaluations (id, evaluation_id, answer_id, rating, looks_ai, created_at) ",
    );
    builder.push_values(rows, |mut row, item| {
        row.push_bind(Uuid::new_v4().to_string())
            .push_bind(evaluation_id.to_string())
            .push_bind(item.answer_id.to_string())
            .push_bind(item.rating)
            .push_bind(item.looks_ai)
            .push_bind(created_at);
    });

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

async fn count_by_evaluator<'e>(
    executor: impl PgExecutor<'e>,
    application_id: &str,
    evaluator_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM evaluations WHERE application_id = $1 AND evaluator_id = $2",
    )
    .bind(application_id)
    .bind(evaluator_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_application(
    pool: &PgPool,
    application_id: &str,
) -> Result<Vec<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!(
        "SELECT {COLUMNS}
         FROM evaluations
         WHERE application_id = $1
         ORDER BY created_at DESC, id ASC"
    ))
    .bind(application_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_answer_evaluations(
    pool: &PgPool,
    evaluation_ids: &[String],
) -> Result<Vec<AnswerEvaluation>, sqlx::Error> {
    if evaluation_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, AnswerEvaluation>(&format!(
        "SELECT {ANSWER_COLUMNS}
         FROM answer_evaluations
         WHERE evaluation_id = ANY($1)
         ORDER BY answer_id"
    ))
    .bind(evaluation_ids)
    .fetch_all(pool)
    .await
}

/// Evaluations created before `created_before` that have no answer judgments.
pub(crate) async fn list_orphaned(
    pool: &PgPool,
    created_before: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!(
        "SELECT {COLUMNS}
         FROM evaluations e
         WHERE e.created_at < $1
           AND NOT EXISTS (
               SELECT 1 FROM answer_evaluations ae WHERE ae.evaluation_id = e.id
           )
         ORDER BY e.created_at
         LIMIT $2"
    ))
    .bind(created_before)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Deletes the given evaluations, skipping any that gained children since they were listed.
pub(crate) async fn delete_orphaned(pool: &PgPool, ids: &[String]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "DELETE FROM evaluations e
         WHERE e.id = ANY($1)
           AND NOT EXISTS (
               SELECT 1 FROM answer_evaluations ae WHERE ae.evaluation_id = e.id
           )",
    )
    .bind(ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
