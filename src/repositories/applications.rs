use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::{Application, ApplicationWithApplicant};
use crate::db::types::{ApplicationStatus, Department};

const COLUMNS: &str =
    "id, user_id, department, submitted, status, created_at, updated_at";

const JOINED_COLUMNS: &str = "\
    a.id, a.user_id, a.department, a.submitted, a.status, a.created_at, a.updated_at, \
    COALESCE(u.full_name, 'Unknown User') AS applicant_name";

#[derive(Debug, Clone, Default)]
pub(crate) struct ApplicationFilter {
    pub(crate) department: Option<Department>,
    pub(crate) submitted: Option<bool>,
    pub(crate) status: Option<ApplicationStatus>,
}

pub(crate) async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM applications WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn find_with_applicant(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ApplicationWithApplicant>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationWithApplicant>(&format!(
        "SELECT {JOINED_COLUMNS}
         FROM applications a
         LEFT JOIN users u ON u.id = a.user_id
         WHERE a.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &ApplicationFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<ApplicationWithApplicant>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {JOINED_COLUMNS} FROM applications a LEFT JOIN users u ON u.id = a.user_id"
    ));
    push_filters(&mut builder, filter);
    builder.push(" ORDER BY a.created_at DESC, a.id ASC OFFSET ");
    builder.push_bind(skip);
    builder.push(" LIMIT ");
    builder.push_bind(limit);

    builder.build_query_as::<ApplicationWithApplicant>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ApplicationFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM applications a");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Application>, sqlx::Error> {
    sqlx::query_as::<_, Application>(&format!(
        "SELECT {COLUMNS}
         FROM applications
         WHERE user_id = $1
         ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ApplicationFilter) {
    builder.push(" WHERE TRUE");
    if let Some(department) = filter.department {
        builder.push(" AND a.department = ");
        builder.push_bind(department);
    }
    if let Some(submitted) = filter.submitted {
        builder.push(" AND a.submitted = ");
        builder.push_bind(submitted);
    }
    if let Some(status) = filter.status {
        builder.push(" AND a.status = ");
        builder.push_bind(status);
    }
}
