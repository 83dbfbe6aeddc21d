use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "\
    id, full_name, email, verified, phone_number, role, chickened_out, reg_num, \
    created_at, updated_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UserSortKey {
    #[default]
    FullName,
    Email,
    Role,
    RegNum,
    ChickenedOut,
    CreatedAt,
}

impl UserSortKey {
    fn column(self) -> &'static str {
        match self {
            UserSortKey::FullName => "full_name",
            UserSortKey::Email => "email",
            UserSortKey::Role => "role::text",
            UserSortKey::RegNum => "reg_num",
            UserSortKey::ChickenedOut => "chickened_out",
            UserSortKey::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct UserFilter {
    pub(crate) search: Option<String>,
    pub(crate) role: Option<UserRole>,
    pub(crate) chickened_out: Option<bool>,
    pub(crate) sort: UserSortKey,
    pub(crate) descending: bool,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &UserFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
    push_filters(&mut builder, filter);

    builder.push(" ORDER BY ");
    builder.push(filter.sort.column());
    builder.push(if filter.descending { " DESC" } else { " ASC" });
    // Stable paging when the sort column has ties.
    builder.push(", id ASC");
    builder.push(" OFFSET ");
    builder.push_bind(skip);
    builder.push(" LIMIT ");
    builder.push_bind(limit);

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &UserFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    let mut has_where = false;
    let mut next_clause = |builder: &mut QueryBuilder<'_, Postgres>| {
        builder.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
    };

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|term| !term.is_empty()) {
        let pattern = super::like_pattern(term);
        next_clause(builder);
        builder.push("(full_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR role::text ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR reg_num ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(role) = filter.role {
        next_clause(builder);
        builder.push("role = ");
        builder.push_bind(role);
    }
    if let Some(chickened_out) = filter.chickened_out {
        next_clause(builder);
        builder.push("chickened_out = ");
        builder.push_bind(chickened_out);
    }
}

#[cfg(test)]
mod tests {
    use super::UserSortKey;

    #[test]
    fn sort_keys_parse_from_query_values() {
        for (raw, key, column) in [
            ("full_name", UserSortKey::FullName, "full_name"),
            ("role", UserSortKey::Role, "role::text"),
            ("chickened_out", UserSortKey::ChickenedOut, "chickened_out"),
            ("created_at", UserSortKey::CreatedAt, "created_at"),
        ] {
            let parsed: UserSortKey =
                serde_json::from_value(serde_json::Value::String(raw.to_string())).unwrap();
            assert_eq!(parsed, key);
            assert_eq!(parsed.column(), column);
        }
    }
}
