use sqlx::PgPool;

use crate::db::models::QaPair;

/// Question/answer pairs of one application, ordered by answer id.
pub(crate) async fn list_qa_pairs(
    pool: &PgPool,
    application_id: &str,
) -> Result<Vec<QaPair>, sqlx::Error> {
    sqlx::query_as::<_, QaPair>(
        "SELECT a.id,
                COALESCE(q.body, 'Unknown Question') AS question,
                a.body AS answer
         FROM answers a
         LEFT JOIN questions q ON q.id = a.question_id
         WHERE a.application_id = $1
         ORDER BY a.id",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await
}
